//! ## mqttrace-core::emitter
//! **Trace-correlated event emission**
//!
//! Wraps the tracing controller and the event logger. An event is only
//! recorded when both a trace id and a span id are available; otherwise the
//! call fails before tags or fields are attached.

use std::sync::Arc;

use mqttrace_telemetry::{EventLogger, Fields, Tags, TracingController};

use crate::error::{EmitError, TracingIntegrityError};
use crate::policy::Direction;

/// Logical stream every intercepted call is recorded on, in both directions.
pub const EVENT_STREAM: &str = "outbound_requests_log";

pub struct TelemetryEmitter {
    tracing: Arc<dyn TracingController>,
    events: Arc<dyn EventLogger>,
}

impl TelemetryEmitter {
    pub fn new(tracing: Arc<dyn TracingController>, events: Arc<dyn EventLogger>) -> Self {
        Self { tracing, events }
    }

    /// Opens the child span covering one intercepted call.
    pub fn open_span(&self) {
        self.tracing.start_child_span();
    }

    /// Records one event and closes the child span.
    ///
    /// On a missing trace or span id the span is left open and nothing is
    /// recorded.
    pub fn record(&self, direction: Direction, host: &str, fields: Fields) -> Result<(), EmitError> {
        let mut event = self.events.new_event(EVENT_STREAM);
        event.record_timestamp();

        let trace_id = present(self.tracing.trace_id())
            .ok_or(TracingIntegrityError::TraceIdUnavailable)?;
        event.set_trace_id(&trace_id);

        let span_id =
            present(self.tracing.span_id()).ok_or(TracingIntegrityError::SpanIdUnavailable)?;
        event.set_span_id(&span_id);

        if let Some(parent) = present(self.tracing.parent_span_id()) {
            event.set_parent_span_id(&parent);
        }

        let mut tags: Tags = self.tracing.span_tags();
        tags.insert("type".into(), direction.type_tag().into());
        tags.insert("domain".into(), host.into());
        event.add_tags(tags);
        event.add_fields(fields);
        event.record()?;

        self.tracing.stop_child_span();
        Ok(())
    }
}

fn present(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}
