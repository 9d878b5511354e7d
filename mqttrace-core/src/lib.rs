//! # mqttrace-core
//!
//! Instrumentation layer for MQTT clients: wraps a client's socket writes and
//! message handling, classifies each packet and records one trace-correlated
//! telemetry event per call.
//!
//! ### Key Submodules:
//! - `classifier`: best-effort packet classification on top of the strict decoder
//! - `policy`: field selection per detail level
//! - `timing`: clocks and fixed-point durations
//! - `emitter`: trace correlation and event recording
//! - `interceptor`: the [`InstrumentedClient`] wrapper

pub mod classifier;
pub mod emitter;
pub mod error;
pub mod interceptor;
pub mod policy;
pub mod timing;

#[cfg(test)]
mod test_support;

pub mod prelude {
    pub use crate::classifier::*;
    pub use crate::emitter::*;
    pub use crate::error::*;
    pub use crate::interceptor::*;
    pub use crate::policy::*;
    pub use crate::timing::*;
}

pub use classifier::{ClassifiedPacket, PacketClassifier, PacketKind, PacketMetadata};
pub use emitter::{TelemetryEmitter, EVENT_STREAM};
pub use error::{EmitError, InterceptError, TracingIntegrityError};
pub use interceptor::{InstrumentedClient, MqttTransport};
pub use mqttrace_config::DetailLevel;
pub use policy::{select_fields, Content, Direction};
pub use timing::{Clock, ManualClock, SystemClock, TimingWindow, Timestamp};
