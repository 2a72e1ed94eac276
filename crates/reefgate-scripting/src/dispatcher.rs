//! Hook dispatcher
//!
//! [`HookDispatcher::run_hook`] is the sole entry point the rest of the
//! gateway depends on. It resolves the script bound to an execution point,
//! marshals the context, runs the sandbox under a budget, translates the
//! outcome into an integer pipeline status, and commits permitted mutations.

use crate::context::ExecutionContext;
use crate::outcome;
use crate::sandbox::{ExecutionBudget, SandboxPool};
use crate::script::{ExecutionPoint, ScriptResolver, ScriptSource, StaticResolver};
use reefgate_core::{OpsLogSink, RequestState, StorageBackend};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace};

/// Hook subsystem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    /// Execution budget applied to every invocation
    #[serde(default)]
    pub budget: ExecutionBudget,

    /// Scripts bound per execution point
    #[serde(default)]
    pub scripts: HashMap<ExecutionPoint, ScriptSource>,
}

/// Orchestrates hook execution for the request pipeline
#[derive(Debug)]
pub struct HookDispatcher {
    resolver: Arc<dyn ScriptResolver>,
    storage: Arc<dyn StorageBackend>,
    opslog: Arc<dyn OpsLogSink>,
    pool: Arc<SandboxPool>,
    budget: ExecutionBudget,
}

impl HookDispatcher {
    /// Create a dispatcher with injected collaborators
    pub fn new(
        resolver: Arc<dyn ScriptResolver>,
        storage: Arc<dyn StorageBackend>,
        opslog: Arc<dyn OpsLogSink>,
    ) -> Self {
        Self {
            resolver,
            storage,
            opslog,
            pool: Arc::new(SandboxPool::new()),
            budget: ExecutionBudget::default(),
        }
    }

    /// Build a dispatcher from configuration, using a static resolver
    pub fn from_config(
        config: HookConfig,
        storage: Arc<dyn StorageBackend>,
        opslog: Arc<dyn OpsLogSink>,
    ) -> Self {
        let mut resolver = StaticResolver::new();
        for (point, source) in config.scripts {
            resolver = resolver.bind(point, source);
        }
        Self::new(Arc::new(resolver), storage, opslog).with_budget(config.budget)
    }

    /// Override the per-invocation budget
    pub fn with_budget(mut self, budget: ExecutionBudget) -> Self {
        self.budget = budget.sanitized();
        self
    }

    /// Run the hook bound to `point`, if any.
    ///
    /// Returns `0` to continue request processing, or a nonzero status code
    /// when the script deliberately short-circuited the request. Script
    /// failures and timeouts are fail-open and also return `0`. This
    /// signature is the gateway/script-subsystem boundary and stays stable.
    pub async fn run_hook(
        &self,
        point: ExecutionPoint,
        op_name: &str,
        state: &mut RequestState,
    ) -> i32 {
        let Some(binding) = self.resolver.resolve(point).await else {
            return 0;
        };
        let script_name = binding.source.name();

        let code = match binding.source.get_code().await {
            Ok(code) => code,
            Err(e) => {
                error!(script = %script_name, point = %point, error = %e,
                    "Failed to load hook script, continuing");
                return 0;
            }
        };

        let ctx = match ExecutionContext::build(point, op_name, state) {
            Ok(ctx) => ctx,
            Err(e) => {
                debug!(script = %script_name, point = %point, reason = %e,
                    "Hook skipped, context unavailable");
                return 0;
            }
        };

        let start = Instant::now();
        let result = {
            let mut sandbox = self.pool.lease();
            sandbox.execute(&code, &ctx, &self.storage, &self.opslog, self.budget)
        };
        trace!(script = %script_name, point = %point,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Hook script executed");

        let status = outcome::translate(&result, &script_name, point);
        if result.commits() {
            ctx.commit(state);
        }
        status
    }
}
