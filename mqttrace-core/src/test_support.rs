//! Test doubles for the interception pipeline.

use std::fmt;
use std::sync::Arc;

use mqttrace_protocols::Message;
use mqttrace_telemetry::{Event, EventLogger, Fields, SinkError, Tags, TracingController};
use parking_lot::Mutex;

use crate::interceptor::MqttTransport;
use crate::timing::{ManualClock, Timestamp};

/// One call made on a [`RecordingEventLogger`] or the events it created.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    NewEvent(String),
    RecordTimestamp,
    SetTraceId(String),
    SetSpanId(String),
    SetParentSpanId(String),
    AddTags(Tags),
    AddFields(Fields),
    Record,
}

/// Event logger that records every call in order.
#[derive(Default)]
pub struct RecordingEventLogger {
    calls: Arc<Mutex<Vec<Call>>>,
    reject: Option<String>,
}

impl RecordingEventLogger {
    pub fn rejecting(reason: &str) -> Self {
        Self {
            calls: Arc::default(),
            reject: Some(reason.to_owned()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn recorded(&self) -> usize {
        self.calls().iter().filter(|call| **call == Call::Record).count()
    }

    /// Fields passed to the most recent event.
    pub fn last_fields(&self) -> Option<Fields> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::AddFields(fields) => Some(fields),
            _ => None,
        })
    }
}

impl EventLogger for RecordingEventLogger {
    fn new_event(&self, name: &str) -> Box<dyn Event + '_> {
        self.calls.lock().push(Call::NewEvent(name.to_owned()));
        Box::new(RecordingEvent {
            calls: self.calls.clone(),
            reject: self.reject.clone(),
        })
    }
}

struct RecordingEvent {
    calls: Arc<Mutex<Vec<Call>>>,
    reject: Option<String>,
}

impl RecordingEvent {
    fn push(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl Event for RecordingEvent {
    fn record_timestamp(&mut self) {
        self.push(Call::RecordTimestamp);
    }

    fn set_trace_id(&mut self, trace_id: &str) {
        self.push(Call::SetTraceId(trace_id.to_owned()));
    }

    fn set_span_id(&mut self, span_id: &str) {
        self.push(Call::SetSpanId(span_id.to_owned()));
    }

    fn set_parent_span_id(&mut self, parent_span_id: &str) {
        self.push(Call::SetParentSpanId(parent_span_id.to_owned()));
    }

    fn add_tags(&mut self, tags: Tags) {
        self.push(Call::AddTags(tags));
    }

    fn add_fields(&mut self, fields: Fields) {
        self.push(Call::AddFields(fields));
    }

    fn record(self: Box<Self>) -> Result<(), SinkError> {
        self.push(Call::Record);
        match &self.reject {
            Some(reason) => Err(SinkError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Tracing controller returning fixed ids and counting span operations.
#[derive(Default)]
pub struct ScriptedTracing {
    trace_id: Option<String>,
    span_id: Option<String>,
    parent_span_id: Option<String>,
    tags: Tags,
    started: Mutex<usize>,
    stopped: Mutex<usize>,
}

impl ScriptedTracing {
    pub fn new(trace_id: Option<&str>, span_id: Option<&str>, parent_span_id: Option<&str>) -> Self {
        Self {
            trace_id: trace_id.map(str::to_owned),
            span_id: span_id.map(str::to_owned),
            parent_span_id: parent_span_id.map(str::to_owned),
            ..Self::default()
        }
    }

    pub fn with_span_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    pub fn started(&self) -> usize {
        *self.started.lock()
    }

    pub fn stopped(&self) -> usize {
        *self.stopped.lock()
    }
}

impl TracingController for ScriptedTracing {
    fn trace_id(&self) -> Option<String> {
        self.trace_id.clone()
    }

    fn span_id(&self) -> Option<String> {
        self.span_id.clone()
    }

    fn parent_span_id(&self) -> Option<String> {
        self.parent_span_id.clone()
    }

    fn span_tags(&self) -> Tags {
        self.tags.clone()
    }

    fn start_child_span(&self) {
        *self.started.lock() += 1;
    }

    fn stop_child_span(&self) {
        *self.stopped.lock() += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackError(pub &'static str);

impl fmt::Display for LoopbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for LoopbackError {}

/// Transport that keeps what it is given and advances a manual clock on
/// every call, so each call has a known duration.
pub struct LoopbackClient {
    pub written: Vec<(Vec<u8>, Option<usize>)>,
    pub handled: Vec<Message>,
    pub clock: ManualClock,
    pub elapsed_micros: u64,
    pub failure: Option<LoopbackError>,
}

pub const LOOPBACK_START: Timestamp = Timestamp::from_micros(1_734_352_683_351_600);

impl LoopbackClient {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            written: Vec::new(),
            handled: Vec::new(),
            clock,
            elapsed_micros: 250,
            failure: None,
        }
    }

    fn finish(&self) -> Result<(), LoopbackError> {
        self.clock.advance(self.elapsed_micros);
        self.failure.clone().map_or(Ok(()), Err)
    }
}

impl MqttTransport for LoopbackClient {
    type Error = LoopbackError;

    fn write_to_socket(&mut self, data: &[u8], length: Option<usize>) -> Result<(), Self::Error> {
        self.written.push((data.to_vec(), length));
        self.finish()
    }

    fn handle_message(&mut self, message: &Message) -> Result<(), Self::Error> {
        self.handled.push(message.clone());
        self.finish()
    }

    fn host(&self) -> &str {
        "host"
    }
}
