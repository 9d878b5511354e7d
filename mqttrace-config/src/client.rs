//! Connection parameters of the instrumented MQTT client.

use mqttrace_protocols::ProtocolVersion;
use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// MQTT client configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ClientConfig {
    /// Broker host name or address. Reported as the `domain` tag.
    #[validate(custom(function = validation::validate_host))]
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier; generated when absent.
    #[validate(length(min = 1, max = 23))]
    #[serde(default)]
    pub client_id: Option<String>,

    /// Protocol revision (`3.1` or `3.1.1`).
    #[serde(default)]
    pub protocol: ProtocolVersion,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    1883
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: None,
            protocol: ProtocolVersion::default(),
        }
    }
}
