//! Execution results and their translation into pipeline decisions

use crate::error::HookError;
use crate::script::ExecutionPoint;
use tracing::{debug, error, info};

/// Tagged outcome of one hook invocation; consumed once by the translator
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Script ran to completion
    Completed,
    /// Script deliberately short-circuited the request with a status code
    Aborted(u16),
    /// Script failed (malformed text or unhandled guest error)
    Failed(HookError),
    /// Budget exhausted; execution was forcibly cut off
    TimedOut,
}

impl ExecutionResult {
    /// Whether this outcome's mutations are written back to the request.
    ///
    /// An abort is an intentional outcome, so its mutations are kept;
    /// failures and timeouts discard theirs.
    pub fn commits(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted(_))
    }
}

/// Map an execution result to the dispatcher's integer return contract.
///
/// Zero means continue; nonzero short-circuits the request with that status.
/// Everything except an explicit abort is fail-open: a broken or slow
/// operator script must not take the storage service down with it.
pub(crate) fn translate(result: &ExecutionResult, script: &str, point: ExecutionPoint) -> i32 {
    match result {
        ExecutionResult::Completed => {
            debug!(script, point = %point, "Hook script completed");
            0
        }
        ExecutionResult::Aborted(code) => {
            info!(script, point = %point, code, "Hook script aborted request");
            i32::from(*code)
        }
        ExecutionResult::Failed(detail) => {
            error!(script, point = %point, error = %detail, "Hook script failed, continuing");
            0
        }
        ExecutionResult::TimedOut => {
            error!(script, point = %point, "Hook script exceeded its budget, continuing");
            0
        }
    }
}
