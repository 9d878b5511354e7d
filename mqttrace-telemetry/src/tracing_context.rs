//! ## mqttrace-telemetry::tracing_context
//! **Trace correlation for telemetry events**
//!
//! A [`TracingController`] answers "which trace and span is active right now"
//! and opens/closes child spans around instrumented operations. Absent ids are
//! `None`; deciding whether that is fatal is left to the caller.

use parking_lot::Mutex;
use uuid::Uuid;

use crate::fields::Tags;

pub trait TracingController {
    fn trace_id(&self) -> Option<String>;
    fn span_id(&self) -> Option<String>;
    /// Parent of the current span; `None` for a root span.
    fn parent_span_id(&self) -> Option<String>;
    /// Tags describing the logical caller of the current span.
    fn span_tags(&self) -> Tags;
    fn start_child_span(&self);
    fn stop_child_span(&self);
}

#[derive(Debug, Default)]
struct SpanStack {
    trace_id: Option<String>,
    /// Root span first, innermost child last.
    spans: Vec<String>,
    root_depth: usize,
    tags: Tags,
}

/// In-process tracing controller with UUID identifiers.
///
/// Suitable for standalone processes that have no external tracing system;
/// every child span gets a fresh id and remembers its parent.
#[derive(Debug, Default)]
pub struct LocalTracingController {
    state: Mutex<SpanStack>,
}

impl LocalTracingController {
    /// A controller without an active trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller with a freshly generated trace and root span.
    pub fn with_new_trace() -> Self {
        Self::with_trace(Uuid::new_v4().to_string(), Uuid::new_v4().to_string())
    }

    /// A controller continuing an existing trace at the given span.
    pub fn with_trace(trace_id: impl Into<String>, root_span_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SpanStack {
                trace_id: Some(trace_id.into()),
                spans: vec![root_span_id.into()],
                root_depth: 1,
                tags: Tags::new(),
            }),
        }
    }

    pub fn set_span_tags(&self, tags: Tags) {
        self.state.lock().tags = tags;
    }

    /// Number of child spans currently open.
    pub fn open_children(&self) -> usize {
        let state = self.state.lock();
        state.spans.len() - state.root_depth
    }
}

impl TracingController for LocalTracingController {
    fn trace_id(&self) -> Option<String> {
        self.state.lock().trace_id.clone()
    }

    fn span_id(&self) -> Option<String> {
        self.state.lock().spans.last().cloned()
    }

    fn parent_span_id(&self) -> Option<String> {
        let state = self.state.lock();
        let depth = state.spans.len();
        (depth >= 2).then(|| state.spans[depth - 2].clone())
    }

    fn span_tags(&self) -> Tags {
        self.state.lock().tags.clone()
    }

    fn start_child_span(&self) {
        self.state.lock().spans.push(Uuid::new_v4().to_string());
    }

    fn stop_child_span(&self) {
        let mut state = self.state.lock();
        if state.spans.len() > state.root_depth {
            state.spans.pop();
        } else {
            tracing::warn!("stop_child_span called without an open child span");
        }
    }
}
