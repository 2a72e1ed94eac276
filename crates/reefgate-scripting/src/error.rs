//! Hook execution error types

use crate::script::ExecutionPoint;
use rhai::{EvalAltResult, Position};

/// Hook execution result type
pub type Result<T, E = HookError> = std::result::Result<T, E>;

/// Errors raised while preparing or running a hook script.
///
/// Every kind except an explicit script abort is fail-open: the dispatcher
/// logs it and the request proceeds as if no hook were configured.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HookError {
    /// The script-visible context cannot be built at this execution point
    #[error("context unavailable at {point}: {reason}")]
    ContextUnavailable {
        /// Execution point the hook was invoked at
        point: ExecutionPoint,
        /// Why the context could not be built
        reason: String,
    },

    /// Malformed script text
    #[error("script compilation error: {message}")]
    Compile {
        /// Compiler diagnostic
        message: String,
    },

    /// A capability operation was called with invalid inputs
    #[error("invalid argument to {capability}: {message}")]
    InvalidArgument {
        /// Capability operation name
        capability: &'static str,
        /// Validation failure detail
        message: String,
    },

    /// The script raised an unhandled runtime error
    #[error("script runtime error: {message}")]
    Runtime {
        /// Guest error detail
        message: String,
    },

    /// Script source could not be loaded
    #[error("script source error: {message}")]
    Source {
        /// Load failure detail
        message: String,
    },
}

impl HookError {
    /// Create a compilation error
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error for a capability operation
    pub fn invalid_argument(capability: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            capability,
            message: message.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Create a source error
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Surface this error inside the sandbox as a script-level error.
    ///
    /// The script may catch it with `try`/`catch`; if it does not, the
    /// invocation ends as `Failed` rather than a host-level fault.
    pub(crate) fn into_sandbox_error(self) -> Box<EvalAltResult> {
        Box::new(EvalAltResult::ErrorRuntime(
            self.to_string().into(),
            Position::NONE,
        ))
    }
}
