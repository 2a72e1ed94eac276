//! Storage backend accessor
//!
//! The gateway's storage layer is an external collaborator; this module
//! defines the narrow read interface other subsystems depend on, plus an
//! in-memory implementation used in tests and embedded deployments.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Storage backend error
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Bucket does not exist
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// Bucket name
        bucket: String,
    },

    /// Object does not exist
    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },

    /// Backend did not respond within the allotted time
    #[error("storage read timed out after {elapsed_ms}ms")]
    Timeout {
        /// Elapsed time in milliseconds
        elapsed_ms: u64,
    },

    /// Backend I/O or protocol failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read accessor for the object storage backend.
///
/// Calls block on the calling thread and must honor the supplied `timeout`:
/// a call may not run longer than the timeout before returning
/// [`StorageError::Timeout`]. A zero timeout fails immediately.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Fetch an object's payload.
    fn get_object(&self, bucket: &str, key: &str, timeout: Duration)
        -> Result<Bytes, StorageError>;
}

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), Bytes>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object
    pub fn put_object(&self, bucket: impl Into<String>, key: impl Into<String>, data: Bytes) {
        self.objects
            .write()
            .insert((bucket.into(), key.into()), data);
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl StorageBackend for MemoryStore {
    fn get_object(
        &self,
        bucket: &str,
        key: &str,
        timeout: Duration,
    ) -> Result<Bytes, StorageError> {
        if timeout.is_zero() {
            return Err(StorageError::Timeout { elapsed_ms: 0 });
        }
        let objects = self.objects.read();
        match objects.get(&(bucket.to_string(), key.to_string())) {
            Some(data) => Ok(data.clone()),
            None => {
                if objects.keys().any(|(b, _)| b == bucket) {
                    Err(StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    })
                } else {
                    Err(StorageError::BucketNotFound {
                        bucket: bucket.to_string(),
                    })
                }
            }
        }
    }
}
