//! Sandboxed script runtime
//!
//! One [`Sandbox`] wraps one Rhai engine. Every invocation compiles the
//! script text, binds the capability table, and evaluates once under an
//! [`ExecutionBudget`] enforced by a wall-clock deadline in the engine's
//! progress hook plus an operation ceiling. Instances are pooled through
//! [`SandboxPool`] with lease/return semantics and a reset to a clean slate
//! on return, so no binding or state survives between invocations.

use crate::capability::{bind_all, CapabilityHost};
use crate::context::ExecutionContext;
use crate::error::HookError;
use crate::outcome::ExecutionResult;
use parking_lot::Mutex;
use reefgate_core::{OpsLogSink, StorageBackend};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock and instruction bounds for one invocation.
///
/// Every invocation runs under a budget; zero values are clamped up so an
/// unbounded execution cannot be configured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionBudget {
    /// Wall-clock deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Engine operation ceiling
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
}

fn default_timeout_ms() -> u64 {
    100
}

fn default_max_operations() -> u64 {
    100_000
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_operations: default_max_operations(),
        }
    }
}

impl ExecutionBudget {
    /// Create a budget
    pub fn new(timeout_ms: u64, max_operations: u64) -> Self {
        Self {
            timeout_ms,
            max_operations,
        }
    }

    /// Clamp zero fields to their minimum; unbounded execution is disallowed
    pub fn sanitized(self) -> Self {
        Self {
            timeout_ms: self.timeout_ms.max(1),
            max_operations: self.max_operations.max(1),
        }
    }

    /// Wall-clock deadline as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One sandboxed script engine instance
#[derive(Debug)]
pub struct Sandbox {
    engine: Engine,
}

impl Sandbox {
    /// Create a fresh sandbox with the engine safety limits applied
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_max_expr_depths(25, 10);
        engine.set_max_string_size(1024 * 1024);
        engine.set_max_array_size(10_000);
        engine.set_max_map_size(10_000);
        let mut sandbox = Self { engine };
        sandbox.reset();
        sandbox
    }

    /// Run one script to completion against `ctx` under `budget`.
    ///
    /// Never returns a host-level fault: malformed scripts, guest errors,
    /// and budget exhaustion all map into an [`ExecutionResult`] variant.
    pub fn execute(
        &mut self,
        script: &str,
        ctx: &ExecutionContext,
        storage: &Arc<dyn StorageBackend>,
        opslog: &Arc<dyn OpsLogSink>,
        budget: ExecutionBudget,
    ) -> ExecutionResult {
        let budget = budget.sanitized();

        let ast = match self.engine.compile(script) {
            Ok(ast) => ast,
            Err(e) => return ExecutionResult::Failed(HookError::compile(e.to_string())),
        };

        let deadline = Instant::now() + budget.timeout();
        let abort = Arc::new(AtomicU32::new(0));

        let host = CapabilityHost::active(
            ctx.clone(),
            Arc::clone(storage),
            Arc::clone(opslog),
            deadline,
            Arc::clone(&abort),
        );
        bind_all(&mut self.engine, &host);
        self.engine.set_max_operations(budget.max_operations);
        let progress_abort = Arc::clone(&abort);
        self.engine.on_progress(move |_ops| {
            if progress_abort.load(Ordering::SeqCst) != 0 {
                return Some(Dynamic::from("aborted"));
            }
            if Instant::now() >= deadline {
                return Some(Dynamic::from("deadline"));
            }
            None
        });

        let mut scope = Scope::new();
        let view = ctx.view();
        scope.push_constant("op", view.operation);
        scope.push_constant("point", view.point.to_string());
        scope.push_constant("method", view.method);
        scope.push_constant("uri", view.uri);
        scope.push_constant("bucket", view.bucket);
        scope.push_constant("object", view.object);

        let mut scratch_map = rhai::Map::new();
        for (k, v) in ctx.scratch() {
            scratch_map.insert(k.into(), v.into());
        }
        scope.push("scratch", scratch_map);

        let eval = self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);

        // An explicit abort is an intentional outcome: its mutations (made
        // before the abort call) are kept, whatever state evaluation ended in.
        let abort_code = abort.load(Ordering::SeqCst);
        if abort_code != 0 {
            harvest_scratch(&scope, ctx);
            return ExecutionResult::Aborted(abort_code as u16);
        }

        match eval {
            Ok(_) => {
                harvest_scratch(&scope, ctx);
                ExecutionResult::Completed
            }
            Err(e) => match e.as_ref() {
                EvalAltResult::ErrorTerminated(_, _)
                | EvalAltResult::ErrorTooManyOperations(_) => ExecutionResult::TimedOut,
                _ => ExecutionResult::Failed(HookError::runtime(e.to_string())),
            },
        }
    }

    /// Reset to a clean slate: detach capability bindings and re-arm default
    /// limits. Called when the sandbox returns to its pool.
    pub fn reset(&mut self) {
        bind_all(&mut self.engine, &CapabilityHost::detached());
        let defaults = ExecutionBudget::default();
        self.engine.set_max_operations(defaults.max_operations);
        self.engine.on_progress(|_| None);
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

// The scratch mapping is string-to-string; non-string values a script stored
// are stringified rather than dropped.
fn harvest_scratch(scope: &Scope<'_>, ctx: &ExecutionContext) {
    if let Some(map) = scope.get_value::<rhai::Map>("scratch") {
        let scratch: HashMap<String, String> = map
            .iter()
            .map(|(k, v)| {
                let value = match v.clone().try_cast::<String>() {
                    Some(s) => s,
                    None => v.to_string(),
                };
                (k.to_string(), value)
            })
            .collect();
        ctx.set_scratch(scratch);
    }
}

/// Pool of sandbox instances with lease/return semantics.
///
/// A leased sandbox is checked out exclusively; it is reset before it
/// rejoins the pool.
#[derive(Debug, Default)]
pub struct SandboxPool {
    idle: Mutex<Vec<Sandbox>>,
}

impl SandboxPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease a sandbox, building a fresh one if none is idle
    pub fn lease(self: &Arc<Self>) -> PooledSandbox {
        let sandbox = self.idle.lock().pop().unwrap_or_default();
        PooledSandbox {
            sandbox: Some(sandbox),
            pool: Arc::clone(self),
        }
    }

    /// Number of idle instances currently pooled
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Exclusive lease on a pooled [`Sandbox`]; resets and returns it on drop
#[derive(Debug)]
pub struct PooledSandbox {
    sandbox: Option<Sandbox>,
    pool: Arc<SandboxPool>,
}

impl Deref for PooledSandbox {
    type Target = Sandbox;

    fn deref(&self) -> &Sandbox {
        self.sandbox.as_ref().expect("sandbox leased")
    }
}

impl DerefMut for PooledSandbox {
    fn deref_mut(&mut self) -> &mut Sandbox {
        self.sandbox.as_mut().expect("sandbox leased")
    }
}

impl Drop for PooledSandbox {
    fn drop(&mut self) {
        if let Some(mut sandbox) = self.sandbox.take() {
            sandbox.reset();
            self.pool.idle.lock().push(sandbox);
        }
    }
}
