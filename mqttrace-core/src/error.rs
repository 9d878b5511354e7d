use mqttrace_telemetry::SinkError;
use thiserror::Error;

/// Trace correlation required for an event is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TracingIntegrityError {
    #[error("Trace ID not available")]
    TraceIdUnavailable,

    #[error("Span ID not available")]
    SpanIdUnavailable,
}

/// Failure to turn an observation into a recorded event.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Tracing(#[from] TracingIntegrityError),

    #[error("Event sink error: {0}")]
    Sink(#[from] SinkError),
}

impl EmitError {
    /// Short label used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            EmitError::Tracing(TracingIntegrityError::TraceIdUnavailable) => "trace_id_unavailable",
            EmitError::Tracing(TracingIntegrityError::SpanIdUnavailable) => "span_id_unavailable",
            EmitError::Sink(_) => "sink_error",
        }
    }
}

/// Error returned by the interception entry points. `E` is the wrapped
/// client's own error type, passed through untouched.
#[derive(Debug, Error)]
pub enum InterceptError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Tracing(TracingIntegrityError),

    #[error("Event sink error: {0}")]
    Sink(#[source] SinkError),

    #[error("MQTT client error: {0}")]
    Client(#[source] E),
}

impl<E: std::error::Error + 'static> From<EmitError> for InterceptError<E> {
    fn from(error: EmitError) -> Self {
        match error {
            EmitError::Tracing(e) => InterceptError::Tracing(e),
            EmitError::Sink(e) => InterceptError::Sink(e),
        }
    }
}

impl<E: std::error::Error + 'static> InterceptError<E> {
    /// The wrapped client's error, if that is what failed.
    pub fn client_error(&self) -> Option<&E> {
        match self {
            InterceptError::Client(e) => Some(e),
            _ => None,
        }
    }
}
