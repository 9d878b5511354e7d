//! # mqttrace Telemetry
//!
//! Crate for the observability side of instrumented clients: event sinks,
//! trace correlation, structured logging and metrics.

pub mod events;
pub mod fields;
pub mod logging;
pub mod metrics;
pub mod otel;
pub mod sinks;
pub mod tracing_context;

pub use events::{Event, EventLogger, EventRecord, PendingEvent, RecordWriter, SinkError};
pub use fields::{FieldValue, Fields, FixedDecimal, Tags};
pub use logging::TracingEventLogger;
pub use metrics::MetricsRecorder;
pub use otel::OtelTracingController;
pub use sinks::{JsonLinesEventLogger, MemoryEventLogger};
pub use tracing_context::{LocalTracingController, TracingController};
