//! Alert persistence sinks
//!
//! Every emitted alert is handed to a sink after the callback has run. The
//! engine does not own any storage format; these sinks cover the common
//! cases of discarding, keeping in memory, or appending NDJSON to a writer.

use crate::error::ComputeError;
use crate::types::AlertEvent;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Durable destination for emitted alerts
pub trait AlertSink {
    fn record(&mut self, event: &AlertEvent) -> Result<(), ComputeError>;
}

/// Discards every alert
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AlertSink for NullSink {
    fn record(&mut self, _event: &AlertEvent) -> Result<(), ComputeError> {
        Ok(())
    }
}

/// Keeps alerts in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn events(&self) -> Vec<AlertEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AlertSink for MemorySink {
    fn record(&mut self, event: &AlertEvent) -> Result<(), ComputeError> {
        self.events
            .lock()
            .map_err(|e| ComputeError::SinkError(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Appends one JSON object per alert, newline-delimited
pub struct NdjsonSink<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl NdjsonSink<File> {
    /// Open (or create) an alert log file in append mode
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(file))
    }
}

impl<W: Write> AlertSink for NdjsonSink<W> {
    fn record(&mut self, event: &AlertEvent) -> Result<(), ComputeError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| ComputeError::SinkError(e.to_string()))
    }
}
