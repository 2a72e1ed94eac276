//! Error types for the Reefgate gateway

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the Reefgate gateway
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or malformed request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bucket does not exist
    #[error("No such bucket: {0}")]
    NoSuchBucket(String),

    /// Object does not exist
    #[error("No such key: {0}")]
    NoSuchKey(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convert error to HTTP status code
    pub fn to_status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::NoSuchBucket(_) | Error::NoSuchKey(_) => StatusCode::NOT_FOUND,
            Error::Storage(crate::storage::StorageError::Timeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            Error::Storage(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
