//! ## mqttrace-telemetry::sinks
//! In-memory and JSON-lines event sinks.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::events::{Event, EventLogger, EventRecord, PendingEvent, RecordWriter, SinkError};

/// Keeps recorded events in a shared buffer. Clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryEventLogger {
    records: Arc<Mutex<Vec<EventRecord>>>,
}

impl MemoryEventLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().clone()
    }

    /// Drains the buffer.
    pub fn take(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl RecordWriter for MemoryEventLogger {
    fn write_record(&self, record: EventRecord) -> Result<(), SinkError> {
        self.records.lock().push(record);
        Ok(())
    }
}

impl EventLogger for MemoryEventLogger {
    fn new_event(&self, name: &str) -> Box<dyn Event + '_> {
        Box::new(PendingEvent::new(name, self))
    }
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesEventLogger<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesEventLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> RecordWriter for JsonLinesEventLogger<W> {
    fn write_record(&self, record: EventRecord) -> Result<(), SinkError> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> EventLogger for JsonLinesEventLogger<W> {
    fn new_event(&self, name: &str) -> Box<dyn Event + '_> {
        Box::new(PendingEvent::new(name, self))
    }
}
