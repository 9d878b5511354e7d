// mqttrace-config/src/validation.rs
//! Custom validation functions for configuration.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    // Host names, IPv4 literals and bracket-less IPv6 literals.
    static ref HOST_RE: Regex = Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9.:\-]*[A-Za-z0-9])?$")
        .expect("host pattern is valid");
}

/// Validate that a broker host is a plausible host name or address.
pub fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.len() <= 253 && HOST_RE.is_match(host) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_host"))
    }
}
