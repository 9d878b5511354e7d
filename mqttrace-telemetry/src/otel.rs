//! ## mqttrace-telemetry::otel
//! Tracing controller backed by the OpenTelemetry context.
//!
//! Ids are read from the span active in [`Context::current`]. Child spans are
//! started through the global tracer and attached to the current context
//! until they are stopped. The controller is tied to the thread that opens
//! spans, like the context guards it holds.

use std::borrow::Cow;
use std::cell::RefCell;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{SpanContext, SpanId, TraceContextExt, Tracer};
use opentelemetry::{Context, ContextGuard};
use parking_lot::Mutex;

use crate::fields::Tags;
use crate::tracing_context::TracingController;

struct OpenSpan {
    parent: Option<SpanId>,
    _guard: ContextGuard,
}

pub struct OtelTracingController {
    tracer: BoxedTracer,
    span_name: Cow<'static, str>,
    tags: Mutex<Tags>,
    open: RefCell<Vec<OpenSpan>>,
}

impl OtelTracingController {
    /// Uses the global tracer; `span_name` names every child span.
    pub fn new(span_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tracer: global::tracer("mqttrace"),
            span_name: span_name.into(),
            tags: Mutex::new(Tags::new()),
            open: RefCell::new(Vec::new()),
        }
    }

    pub fn set_span_tags(&self, tags: Tags) {
        *self.tags.lock() = tags;
    }

    fn current_span_context() -> Option<SpanContext> {
        let cx = Context::current();
        let span_context = cx.span().span_context().clone();
        if span_context.is_valid() {
            Some(span_context)
        } else {
            None
        }
    }
}

impl TracingController for OtelTracingController {
    fn trace_id(&self) -> Option<String> {
        Self::current_span_context().map(|sc| sc.trace_id().to_string())
    }

    fn span_id(&self) -> Option<String> {
        Self::current_span_context().map(|sc| sc.span_id().to_string())
    }

    fn parent_span_id(&self) -> Option<String> {
        self.open
            .borrow()
            .last()
            .and_then(|open| open.parent)
            .map(|id| id.to_string())
    }

    fn span_tags(&self) -> Tags {
        self.tags.lock().clone()
    }

    fn start_child_span(&self) {
        let parent_cx = Context::current();
        let parent = Self::current_span_context().map(|sc| sc.span_id());
        let span = self
            .tracer
            .start_with_context(self.span_name.clone(), &parent_cx);
        let guard = parent_cx.with_span(span).attach();
        self.open.borrow_mut().push(OpenSpan {
            parent,
            _guard: guard,
        });
    }

    fn stop_child_span(&self) {
        let mut open = self.open.borrow_mut();
        if let Some(child) = open.pop() {
            Context::current().span().end();
            drop(child);
        } else {
            tracing::warn!("stop_child_span called without an open child span");
        }
    }
}
