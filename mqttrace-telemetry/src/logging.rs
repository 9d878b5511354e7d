//! ## mqttrace-telemetry::logging
//! **Structured logging with `tracing`**
//!
//! Installs the process-wide subscriber and provides [`TracingEventLogger`],
//! a sink that turns every telemetry record into a `tracing` event on the
//! `mqttrace::events` target.

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::events::{Event, EventLogger, EventRecord, PendingEvent, RecordWriter, SinkError};

/// Installs the global `fmt` subscriber writing to stderr. `RUST_LOG` takes
/// precedence over `default_filter`.
pub fn init(default_filter: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt()
        .with_env_filter(env_filter(default_filter))
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init()
}

/// Subscriber for the startup phase, before configuration (and with it the
/// final filter) is known. Use it with `tracing::subscriber::with_default`.
pub fn bootstrap_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync {
    stderr_subscriber(env_filter(default_filter))
}

fn stderr_subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync {
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish()
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Event sink backed by the active `tracing` subscriber.
#[derive(Debug, Default, Clone)]
pub struct TracingEventLogger;

impl TracingEventLogger {
    pub fn new() -> Self {
        Self
    }
}

impl RecordWriter for TracingEventLogger {
    fn write_record(&self, record: EventRecord) -> Result<(), SinkError> {
        let tags = serde_json::to_string(&record.tags)?;
        let fields = serde_json::to_string(&record.fields)?;

        tracing::info!(
            target: "mqttrace::events",
            event = %record.name,
            trace_id = record.trace_id.as_deref().unwrap_or_default(),
            span_id = record.span_id.as_deref().unwrap_or_default(),
            parent_span_id = record.parent_span_id.as_deref(),
            timestamp = ?record.timestamp,
            tags = %tags,
            fields = %fields,
            "telemetry event recorded"
        );
        Ok(())
    }
}

impl EventLogger for TracingEventLogger {
    fn new_event(&self, name: &str) -> Box<dyn Event + '_> {
        Box::new(PendingEvent::new(name, self))
    }
}
