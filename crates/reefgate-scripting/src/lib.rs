//! # Reefgate Scripting Hooks
//!
//! Operator-supplied scripts attached to points in the request lifecycle:
//! custom policy, auditing, and response mutation without gateway code
//! changes.
//!
//! ## Model
//!
//! - **Execution points** — `pre-request`, `post-request`, `background`
//! - **Sandboxed Rhai runtime** — pooled engine instances, reset between
//!   invocations, executed under a wall-clock and operation budget
//! - **Capability surface** — a fixed table of validated operations
//!   (`read_header`, `set_response_header`, `set_status`, `log`,
//!   `storage_get`, `abort`); no other gateway functionality is reachable
//! - **Fail-open** — a broken or slow script logs and the request proceeds;
//!   only an explicit `abort(code)` changes the client-visible outcome
//!
//! ## Example
//!
//! ```no_run
//! use reefgate_core::{MemoryOpsLog, MemoryStore, RequestState};
//! use reefgate_scripting::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let resolver = StaticResolver::new().bind(
//!     ExecutionPoint::PreRequest,
//!     ScriptSource::inline(r#"
//!         if read_header("x-api-key") == "" {
//!             log("audit", "rejected unauthenticated request");
//!             abort(401);
//!         }
//!     "#),
//! );
//! let dispatcher = HookDispatcher::new(
//!     Arc::new(resolver),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryOpsLog::new()),
//! );
//!
//! let mut state = RequestState::new("GET", "/photos/cat.jpg");
//! let status = dispatcher
//!     .run_hook(ExecutionPoint::PreRequest, "get_obj", &mut state)
//!     .await;
//! assert_eq!(status, 401);
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod capability;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod outcome;
pub mod sandbox;
pub mod script;

pub use capability::{Capability, CapabilityDef, CAPABILITIES};
pub use context::{ExecutionContext, RequestView};
pub use dispatcher::{HookConfig, HookDispatcher};
pub use error::{HookError, Result};
pub use outcome::ExecutionResult;
pub use sandbox::{ExecutionBudget, Sandbox, SandboxPool};
pub use script::{ExecutionPoint, ScriptBinding, ScriptResolver, ScriptSource, StaticResolver};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::context::ExecutionContext;
    pub use crate::dispatcher::{HookConfig, HookDispatcher};
    pub use crate::error::{HookError, Result};
    pub use crate::outcome::ExecutionResult;
    pub use crate::sandbox::ExecutionBudget;
    pub use crate::script::{
        ExecutionPoint, ScriptBinding, ScriptResolver, ScriptSource, StaticResolver,
    };
}
