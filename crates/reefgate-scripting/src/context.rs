//! Script execution context
//!
//! [`ExecutionContext`] is the per-invocation, script-visible projection of
//! the live request state. It copies fields in at hook entry and writes the
//! writable subset (response status, response headers, scratch mapping) back
//! at hook exit; gateway internals are never handed to guest code.

use crate::error::{HookError, Result};
use crate::script::ExecutionPoint;
use parking_lot::Mutex;
use reefgate_core::{RequestState, ResponseState};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only request metadata visible to the script
#[derive(Debug, Clone)]
pub struct RequestView {
    /// Gateway operation name (e.g. `get_obj`)
    pub operation: String,
    /// Execution point this invocation runs at
    pub point: ExecutionPoint,
    /// Request ID for log correlation
    pub request_id: String,
    /// HTTP method
    pub method: String,
    /// Request URI
    pub uri: String,
    /// Target bucket
    pub bucket: String,
    /// Target object key
    pub object: String,
    /// Request headers
    pub headers: HashMap<String, String>,
}

#[derive(Debug)]
struct ContextInner {
    view: RequestView,
    response_status: u16,
    response_headers: HashMap<String, String>,
    response_dirty: bool,
    scratch: HashMap<String, String>,
}

/// Per-invocation script-visible context.
///
/// Interior state sits behind a mutex so capability handlers bound onto the
/// engine can mutate it; the handle is owned exclusively by one invocation
/// and is never shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    inner: Arc<Mutex<ContextInner>>,
}

impl ExecutionContext {
    /// Build the script-visible context from the live request state.
    ///
    /// Fails with [`HookError::ContextUnavailable`] when the execution point
    /// needs state that does not exist yet, in which case the hook is
    /// skipped.
    pub fn build(
        point: ExecutionPoint,
        operation: &str,
        state: &RequestState,
    ) -> Result<Self> {
        if point == ExecutionPoint::PostRequest && state.response.is_none() {
            return Err(HookError::ContextUnavailable {
                point,
                reason: "no response object exists for this request yet".to_string(),
            });
        }

        let (response_status, response_headers) = match &state.response {
            Some(resp) => (resp.status, resp.headers.clone()),
            None => (200, HashMap::new()),
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(ContextInner {
                view: RequestView {
                    operation: operation.to_string(),
                    point,
                    request_id: state.request_id.clone(),
                    method: state.method.clone(),
                    uri: state.uri.clone(),
                    bucket: state.bucket.clone(),
                    object: state.object.clone(),
                    headers: state.headers.clone(),
                },
                response_status,
                response_headers,
                response_dirty: false,
                scratch: state.scratch.clone(),
            })),
        })
    }

    /// Copy the writable subset back into the live request state.
    ///
    /// Only response status, response headers, and the scratch mapping are
    /// applied; everything else the script may have attempted was already
    /// rejected at the capability boundary. Called only for `Completed` and
    /// `Aborted` outcomes.
    pub fn commit(&self, state: &mut RequestState) {
        let inner = self.inner.lock();
        state.scratch = inner.scratch.clone();
        if inner.response_dirty {
            let resp = state
                .response
                .get_or_insert_with(ResponseState::default);
            resp.status = inner.response_status;
            resp.headers = inner.response_headers.clone();
        }
    }

    /// Snapshot of the read-only request metadata
    pub fn view(&self) -> RequestView {
        self.inner.lock().view.clone()
    }

    /// Request header value, if present
    pub(crate) fn request_header(&self, name: &str) -> Option<String> {
        self.inner.lock().view.headers.get(name).cloned()
    }

    /// Set the response status; applied immediately to the context
    pub(crate) fn set_response_status(&self, status: u16) {
        let mut inner = self.inner.lock();
        inner.response_status = status;
        inner.response_dirty = true;
    }

    /// Set a response header; applied immediately to the context
    pub(crate) fn set_response_header(&self, name: &str, value: &str) {
        let mut inner = self.inner.lock();
        inner
            .response_headers
            .insert(name.to_string(), value.to_string());
        inner.response_dirty = true;
    }

    /// Current scratch mapping
    pub(crate) fn scratch(&self) -> HashMap<String, String> {
        self.inner.lock().scratch.clone()
    }

    /// Replace the scratch mapping with the script's final version
    pub(crate) fn set_scratch(&self, scratch: HashMap<String, String>) {
        self.inner.lock().scratch = scratch;
    }
}
