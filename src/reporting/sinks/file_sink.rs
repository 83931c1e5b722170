use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use log::{error, info};

use crate::error_handling::types::SinkError;
use crate::reporting::event::Event;
use crate::reporting::sink::Sink;

/// Appends every event to a file as one JSON object per line.
///
/// The file is opened once in append mode and flushed after each event so that a crash
/// loses at most the event being written.
pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                error!("Failed to open event log {}: {}", path.display(), e);
                SinkError::IoError(e)
            })?;
        info!("FileSink writing events to {}", path.display());

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        "file"
    }

    fn handle(&self, event: &Event) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)
            .map_err(|e| SinkError::SerializationFailed(e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}
