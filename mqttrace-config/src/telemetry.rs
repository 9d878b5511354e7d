//! Observability configuration.
//!
//! Parameters for diagnostics logging and for where recorded telemetry
//! events are written.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Destination of recorded telemetry events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutput {
    /// One JSON object per line on standard output.
    #[default]
    Stdout,
    /// Structured `tracing` events on the `mqttrace::events` target.
    Log,
}

/// Telemetry configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[validate(length(min = 1))]
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Where recorded events go.
    #[serde(default)]
    pub event_output: EventOutput,
}

fn default_log_filter() -> String {
    "info".into()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            event_output: EventOutput::default(),
        }
    }
}
