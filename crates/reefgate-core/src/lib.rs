//! # Reefgate Core
//!
//! Core types, traits, and error handling for the Reefgate object-storage
//! gateway.
//!
//! This crate provides the foundational abstractions shared across the
//! gateway:
//! - Per-request state (the live request/response the pipeline owns)
//! - Storage backend accessor trait
//! - Append-only operations-log sink
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod opslog;
pub mod request;
pub mod storage;

pub use error::{Error, Result};
pub use opslog::{FileOpsLog, MemoryOpsLog, OpsLogEntry, OpsLogSink};
pub use request::{RequestState, ResponseState};
pub use storage::{MemoryStore, StorageBackend, StorageError};

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::opslog::{OpsLogEntry, OpsLogSink};
    pub use crate::request::{RequestState, ResponseState};
    pub use crate::storage::{StorageBackend, StorageError};
}
