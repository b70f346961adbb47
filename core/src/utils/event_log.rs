//! Append-only narrative log of a scan run.
//!
//! One line per event, `<timestamp> - <message>`. The handle is opened once by
//! the caller and shared (`Arc<EventLog>`) with the engine and the reporter.
//! Writers serialize on an internal mutex, so concurrent probes may record
//! without interleaving partial lines.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;

use crate::error::ScanError;

pub const DEFAULT_LOG_FILE: &str = "xss_test_results.log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

pub type EventLogRef = Arc<EventLog>;

pub struct EventLog {
    writer: Mutex<Box<dyn Write + Send>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ScanError::io(path, e))?;
        Ok(Self {
            writer: Mutex::new(Box::new(BufWriter::new(file))),
            path: Some(path.to_path_buf()),
        })
    }

    /// A log that drops every line. Used by dry runs and tests.
    pub fn discard() -> Self {
        Self {
            writer: Mutex::new(Box::new(io::sink())),
            path: None,
        }
    }

    pub fn into_ref(self) -> EventLogRef {
        Arc::new(self)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, message: &str) {
        let line = format_line(&Local::now().format(TIMESTAMP_FORMAT).to_string(), message);
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.write_all(line.as_bytes()) {
            log::warn!("Failed to write event log line: {}", e);
        }
    }

    pub fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writer.flush() {
            log::warn!("Failed to flush event log: {}", e);
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.flush();
    }
}

fn format_line(timestamp: &str, message: &str) -> String {
    // Embedded newlines would break the one-event-per-line layout.
    let message = message.replace(['\r', '\n'], " ");
    format!("{} - {}\n", timestamp, message)
}
