//! Analytics detail configuration.
//!
//! Controls how much packet content the instrumentation layer may copy into
//! telemetry events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Verbosity tier for emitted telemetry. Ordered `Info < Detailed < Full`.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    /// Timing and topic only.
    #[default]
    Info,
    /// Adds packet metadata and a truncated body.
    Detailed,
    /// Adds packet metadata and the complete body.
    Full,
}

impl DetailLevel {
    #[inline]
    pub fn at_least(self, level: DetailLevel) -> bool {
        self >= level
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Detailed => "detailed",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "detailed" => Ok(Self::Detailed),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown detail level '{}', expected info, detailed or full",
                other
            )),
        }
    }
}

/// Analytics configuration.
#[derive(Default, Debug, Serialize, Deserialize, Validate, Clone)]
pub struct AnalyticsConfig {
    /// Initial detail level of instrumented clients.
    #[serde(default)]
    pub detail_level: DetailLevel,
}
