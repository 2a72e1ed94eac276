//! Append-only operations log
//!
//! Audit entries produced anywhere in the gateway (including operator
//! scripts) flow into an [`OpsLogSink`]. Appends are atomic per entry:
//! concurrent writers may interleave entries but never corrupt one.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

/// One operations-log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsLogEntry {
    /// Entry timestamp
    pub timestamp: DateTime<Utc>,
    /// Request ID for correlation
    pub request_id: String,
    /// Gateway operation name (e.g. `get_obj`, `put_obj`)
    pub operation: String,
    /// Entry level/category (e.g. `info`, `audit`)
    pub level: String,
    /// Entry message
    pub message: String,
}

impl OpsLogEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        request_id: impl Into<String>,
        operation: impl Into<String>,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: request_id.into(),
            operation: operation.into(),
            level: level.into(),
            message: message.into(),
        }
    }
}

/// Append-only sink for operations-log entries.
///
/// `append` is called from request worker threads, including from inside
/// script capability calls, so implementations must be cheap and must not
/// block indefinitely.
pub trait OpsLogSink: Send + Sync + std::fmt::Debug {
    /// Append one entry
    fn append(&self, entry: OpsLogEntry);
}

/// In-memory sink, for tests and embedded use
#[derive(Debug, Default)]
pub struct MemoryOpsLog {
    entries: Mutex<Vec<OpsLogEntry>>,
}

impl MemoryOpsLog {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries appended so far
    pub fn entries(&self) -> Vec<OpsLogEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries appended so far
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the sink holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl OpsLogSink for MemoryOpsLog {
    fn append(&self, entry: OpsLogEntry) {
        self.entries.lock().push(entry);
    }
}

/// File sink writing one JSON object per line
#[derive(Debug)]
pub struct FileOpsLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl FileOpsLog {
    /// Open (or create) the log file in append mode
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path this sink writes to
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl OpsLogSink for FileOpsLog {
    fn append(&self, entry: OpsLogEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize ops-log entry");
                return;
            }
        };
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::error!(error = %e, path = %self.path.display(), "Failed to append ops-log entry");
        }
    }
}
