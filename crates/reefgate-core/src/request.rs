//! Live per-request state owned by the request pipeline
//!
//! [`RequestState`] is the gateway's native view of one in-flight request.
//! The scripting subsystem never hands this object to guest code; it marshals
//! a restricted copy in and commits the writable subset back out.

use std::collections::HashMap;
use uuid::Uuid;

/// Live state for one in-flight request
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Unique request ID for tracing and log correlation
    pub request_id: String,

    /// HTTP method
    pub method: String,

    /// Request URI
    pub uri: String,

    /// Target bucket name (empty for service-level operations)
    pub bucket: String,

    /// Target object key (empty for bucket/service-level operations)
    pub object: String,

    /// Request headers
    pub headers: HashMap<String, String>,

    /// Response state, present once a response object exists for this request
    pub response: Option<ResponseState>,

    /// Per-request scratch mapping shared between hook invocations
    pub scratch: HashMap<String, String>,
}

impl RequestState {
    /// Create a new request state
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            method: method.into(),
            uri: uri.into(),
            bucket: String::new(),
            object: String::new(),
            headers: HashMap::new(),
            response: None,
            scratch: HashMap::new(),
        }
    }

    /// Set the target bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the target object key
    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = object.into();
        self
    }

    /// Set a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Get a request header
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// Attach an empty response object, as the pipeline does once the
    /// operation starts producing one
    pub fn begin_response(&mut self) -> &mut ResponseState {
        self.response.get_or_insert_with(ResponseState::default)
    }
}

/// Response portion of the live request state
#[derive(Debug, Clone)]
pub struct ResponseState {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HashMap<String, String>,
}

impl ResponseState {
    /// Create a response state with the given status
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
        }
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new(200)
    }
}
