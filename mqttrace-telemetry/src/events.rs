//! ## mqttrace-telemetry::events
//! **Event sink interface and the record it produces**
//!
//! An [`EventLogger`] hands out one [`Event`] per observation. The event is
//! filled incrementally and consumed by [`Event::record`], so a value can be
//! recorded at most once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::fields::{Fields, Tags};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event rejected by sink: {0}")]
    Rejected(String),
}

/// A telemetry event under construction.
pub trait Event {
    /// Captures the wall-clock time of recording.
    fn record_timestamp(&mut self);
    fn set_trace_id(&mut self, trace_id: &str);
    fn set_span_id(&mut self, span_id: &str);
    fn set_parent_span_id(&mut self, parent_span_id: &str);
    /// Merges tags; later keys override earlier ones.
    fn add_tags(&mut self, tags: Tags);
    /// Merges fields; later keys override earlier ones.
    fn add_fields(&mut self, fields: Fields);
    /// Seals the event and hands it to the backing store.
    fn record(self: Box<Self>) -> Result<(), SinkError>;
}

/// Factory for events on a named logical stream.
pub trait EventLogger {
    fn new_event(&self, name: &str) -> Box<dyn Event + '_>;
}

/// A sealed telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub tags: Tags,
    pub fields: Fields,
}

impl EventRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
            trace_id: None,
            span_id: None,
            parent_span_id: None,
            tags: Tags::new(),
            fields: Fields::new(),
        }
    }
}

/// Backing store for sealed records.
pub trait RecordWriter: Send + Sync {
    fn write_record(&self, record: EventRecord) -> Result<(), SinkError>;
}

/// [`Event`] implementation shared by all sinks of this crate: accumulates an
/// [`EventRecord`] and passes it to a [`RecordWriter`] on `record`.
pub struct PendingEvent<'a> {
    record: EventRecord,
    writer: &'a dyn RecordWriter,
}

impl<'a> PendingEvent<'a> {
    pub fn new(name: &str, writer: &'a dyn RecordWriter) -> Self {
        Self {
            record: EventRecord::new(name),
            writer,
        }
    }
}

impl Event for PendingEvent<'_> {
    fn record_timestamp(&mut self) {
        self.record.timestamp = Some(Utc::now());
    }

    fn set_trace_id(&mut self, trace_id: &str) {
        self.record.trace_id = Some(trace_id.to_owned());
    }

    fn set_span_id(&mut self, span_id: &str) {
        self.record.span_id = Some(span_id.to_owned());
    }

    fn set_parent_span_id(&mut self, parent_span_id: &str) {
        self.record.parent_span_id = Some(parent_span_id.to_owned());
    }

    fn add_tags(&mut self, tags: Tags) {
        self.record.tags.extend(tags);
    }

    fn add_fields(&mut self, fields: Fields) {
        self.record.fields.extend(fields);
    }

    fn record(self: Box<Self>) -> Result<(), SinkError> {
        let PendingEvent { record, writer } = *self;
        writer.write_record(record)
    }
}
