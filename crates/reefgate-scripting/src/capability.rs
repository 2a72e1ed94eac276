//! Capability API surface
//!
//! The fixed set of operations a hook script can call. Each operation is
//! declared in a registration table with a capability tag and a typed
//! handler, and is bound onto a leased engine fresh for every invocation.
//! Nothing else in the gateway is reachable from guest code.
//!
//! Handlers validate their inputs and fail as script-level errors; a script
//! may catch them with `try`/`catch`, and an uncaught one ends the
//! invocation as `Failed` without faulting the host.

use crate::context::ExecutionContext;
use crate::error::HookError;
use reefgate_core::{OpsLogEntry, OpsLogSink, StorageBackend};
use rhai::{Engine, EvalAltResult};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

type RhaiResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// Capability required by an exposed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read request metadata
    ReadMetadata,
    /// Mutate the writable response fields
    WriteResponse,
    /// Append an operations-log entry
    LogWrite,
    /// Constrained storage lookup
    StorageRead,
    /// Short-circuit the request
    Abort,
}

/// One entry in the capability registration table
#[derive(Debug, Clone, Copy)]
pub struct CapabilityDef {
    /// Operation name as seen by scripts
    pub name: &'static str,
    /// Capability tag the operation requires
    pub capability: Capability,
    bind: fn(&mut Engine, CapabilityHost),
}

/// The full registration table: every operation reachable from guest code.
pub static CAPABILITIES: &[CapabilityDef] = &[
    CapabilityDef {
        name: "read_header",
        capability: Capability::ReadMetadata,
        bind: bind_read_header,
    },
    CapabilityDef {
        name: "set_response_header",
        capability: Capability::WriteResponse,
        bind: bind_set_response_header,
    },
    CapabilityDef {
        name: "set_status",
        capability: Capability::WriteResponse,
        bind: bind_set_status,
    },
    CapabilityDef {
        name: "log",
        capability: Capability::LogWrite,
        bind: bind_log,
    },
    CapabilityDef {
        name: "storage_get",
        capability: Capability::StorageRead,
        bind: bind_storage_get,
    },
    CapabilityDef {
        name: "abort",
        capability: Capability::Abort,
        bind: bind_abort,
    },
];

/// Bind every table entry onto the engine for one invocation
pub(crate) fn bind_all(engine: &mut Engine, host: &CapabilityHost) {
    for def in CAPABILITIES {
        (def.bind)(engine, host.clone());
    }
}

#[derive(Debug)]
struct HostInner {
    ctx: ExecutionContext,
    storage: Arc<dyn StorageBackend>,
    opslog: Arc<dyn OpsLogSink>,
    request_id: String,
    operation: String,
    deadline: Instant,
    abort: Arc<AtomicU32>,
}

/// Per-invocation state the bound handlers capture.
///
/// A detached host (every call errors) is re-bound when a sandbox returns to
/// the pool, so no invocation's context outlives its lease.
#[derive(Debug, Clone)]
pub(crate) struct CapabilityHost {
    inner: Option<Arc<HostInner>>,
}

impl CapabilityHost {
    /// Host wired to one live invocation
    pub(crate) fn active(
        ctx: ExecutionContext,
        storage: Arc<dyn StorageBackend>,
        opslog: Arc<dyn OpsLogSink>,
        deadline: Instant,
        abort: Arc<AtomicU32>,
    ) -> Self {
        let view = ctx.view();
        Self {
            inner: Some(Arc::new(HostInner {
                ctx,
                storage,
                opslog,
                request_id: view.request_id,
                operation: view.operation,
                deadline,
                abort,
            })),
        }
    }

    /// Host with no invocation behind it
    pub(crate) fn detached() -> Self {
        Self { inner: None }
    }

    fn require(&self) -> RhaiResult<&HostInner> {
        self.inner.as_deref().ok_or_else(|| {
            HookError::runtime("capability called outside an active hook invocation")
                .into_sandbox_error()
        })
    }

    fn read_header(&self, name: &str) -> RhaiResult<String> {
        let inner = self.require()?;
        validate_nonempty("read_header", "header name", name)?;
        Ok(inner.ctx.request_header(name).unwrap_or_default())
    }

    fn set_response_header(&self, name: &str, value: &str) -> RhaiResult<()> {
        let inner = self.require()?;
        validate_nonempty("set_response_header", "header name", name)?;
        inner.ctx.set_response_header(name, value);
        Ok(())
    }

    fn set_status(&self, code: i64) -> RhaiResult<()> {
        let inner = self.require()?;
        let code = validate_status("set_status", code)?;
        inner.ctx.set_response_status(code);
        Ok(())
    }

    fn log(&self, level: &str, message: &str) -> RhaiResult<()> {
        let inner = self.require()?;
        validate_nonempty("log", "level", level)?;
        inner.opslog.append(OpsLogEntry::new(
            &inner.request_id,
            &inner.operation,
            level,
            message,
        ));
        Ok(())
    }

    fn storage_get(&self, bucket: &str, key: &str) -> RhaiResult<rhai::Blob> {
        let inner = self.require()?;
        validate_nonempty("storage_get", "bucket name", bucket)?;
        validate_nonempty("storage_get", "object key", key)?;
        // Nested timeout: the lookup may never outlive the remaining budget.
        let remaining = inner.deadline.saturating_duration_since(Instant::now());
        inner
            .storage
            .get_object(bucket, key, remaining)
            .map(|bytes| bytes.to_vec())
            .map_err(|e| {
                HookError::runtime(format!("storage_get failed: {}", e)).into_sandbox_error()
            })
    }

    fn abort(&self, code: i64) -> RhaiResult<()> {
        let inner = self.require()?;
        let code = validate_status("abort", code)?;
        inner.abort.store(u32::from(code), Ordering::SeqCst);
        // Halts evaluation; the progress hook also terminates the script on
        // the next operation even if guest code catches this error.
        Err(HookError::runtime(format!("request aborted with status {}", code))
            .into_sandbox_error())
    }
}

fn validate_nonempty(
    capability: &'static str,
    what: &str,
    value: &str,
) -> RhaiResult<()> {
    if value.is_empty() {
        return Err(
            HookError::invalid_argument(capability, format!("{} must not be empty", what))
                .into_sandbox_error(),
        );
    }
    Ok(())
}

fn validate_status(capability: &'static str, code: i64) -> RhaiResult<u16> {
    // `StatusCode::from_u16` also admits 600-999; scripts get the standard
    // HTTP range only.
    u16::try_from(code)
        .ok()
        .filter(|c| (100..=599).contains(c))
        .and_then(|c| http::StatusCode::from_u16(c).ok())
        .map(|c| c.as_u16())
        .ok_or_else(|| {
            HookError::invalid_argument(
                capability,
                format!("{} is not a valid HTTP status code", code),
            )
            .into_sandbox_error()
        })
}

fn bind_read_header(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("read_header", move |name: &str| host.read_header(name));
}

fn bind_set_response_header(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("set_response_header", move |name: &str, value: &str| {
        host.set_response_header(name, value)
    });
}

fn bind_set_status(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("set_status", move |code: i64| host.set_status(code));
}

fn bind_log(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("log", move |level: &str, message: &str| {
        host.log(level, message)
    });
}

fn bind_storage_get(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("storage_get", move |bucket: &str, key: &str| {
        host.storage_get(bucket, key)
    });
}

fn bind_abort(engine: &mut Engine, host: CapabilityHost) {
    engine.register_fn("abort", move |code: i64| host.abort(code));
}
