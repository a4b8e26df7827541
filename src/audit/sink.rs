use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use super::event::AuditEvent;

/// Errors that can occur while recording audit events.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for audit events.
///
/// Implementations must not interleave partial writes from concurrent calls.
pub trait AuditSink: Send + Sync {
    /// Record one event.
    fn log(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    description: String,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap an arbitrary writer.
    pub fn new(writer: W, description: impl Into<String>) -> Self {
        JsonLinesSink {
            writer: Mutex::new(writer),
            description: description.into(),
        }
    }

    /// Human-readable destination, for startup logs.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<BufWriter<std::fs::File>> {
    /// Open or create an audit log file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        Ok(JsonLinesSink::new(
            BufWriter::new(file),
            path.display().to_string(),
        ))
    }
}

impl JsonLinesSink<io::Stdout> {
    /// Write audit events to standard output.
    pub fn stdout() -> Self {
        JsonLinesSink::new(io::stdout(), "stdout")
    }
}

impl<W: Write + Send> AuditSink for JsonLinesSink<W> {
    fn log(&self, event: &AuditEvent) -> Result<(), AuditError> {
        // Serialize outside the lock so the critical section is a single write
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.flush()?;

        Ok(())
    }
}
