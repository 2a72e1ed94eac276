//! Script bindings and resolution
//!
//! Where scripts come from (local files, replicated config, an admin API) is
//! the configuration layer's concern; this module defines the narrow
//! interface the dispatcher consumes.

use crate::error::{HookError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Named stage in a request's lifecycle where a script may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPoint {
    /// Before the operation executes
    PreRequest,
    /// After the operation executed, before the response is sent
    PostRequest,
    /// Out-of-band, not tied to a client request
    Background,
}

impl fmt::Display for ExecutionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreRequest => write!(f, "pre-request"),
            Self::PostRequest => write!(f, "post-request"),
            Self::Background => write!(f, "background"),
        }
    }
}

/// Script source (inline or file-based)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptSource {
    /// Inline script code
    Inline {
        /// Script code
        code: String,
        /// Optional name for logging
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// File-based script
    File {
        /// Path to script file
        path: PathBuf,
    },
}

impl ScriptSource {
    /// Create inline script source
    pub fn inline<S: Into<String>>(code: S) -> Self {
        Self::Inline {
            code: code.into(),
            name: None,
        }
    }

    /// Create inline script with name
    pub fn inline_named<S: Into<String>, N: Into<String>>(code: S, name: N) -> Self {
        Self::Inline {
            code: code.into(),
            name: Some(name.into()),
        }
    }

    /// Create file-based script source
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self::File { path: path.into() }
    }

    /// Get script code (loads from file if needed)
    pub async fn get_code(&self) -> Result<String> {
        match self {
            Self::Inline { code, .. } => Ok(code.clone()),
            Self::File { path } => tokio::fs::read_to_string(path).await.map_err(|e| {
                HookError::source(format!("failed to read script file {:?}: {}", path, e))
            }),
        }
    }

    /// Get a descriptive name for this script
    pub fn name(&self) -> String {
        match self {
            Self::Inline { name, .. } => name.clone().unwrap_or_else(|| "inline".to_string()),
            Self::File { path } => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown")
                .to_string(),
        }
    }
}

/// Association between an execution point and a script body.
///
/// Immutable once resolved for an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptBinding {
    /// Execution point the script is attached to
    pub point: ExecutionPoint,
    /// Script body
    pub source: ScriptSource,
}

/// Resolves the script bound to an execution point.
///
/// Injected by the configuration layer; the dispatcher has no knowledge of
/// where scripts are stored or how they are replicated.
#[async_trait]
pub trait ScriptResolver: Send + Sync + fmt::Debug {
    /// Script bound to `point`, if any
    async fn resolve(&self, point: ExecutionPoint) -> Option<ScriptBinding>;
}

/// Map-backed resolver for a fixed set of bindings
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    bindings: HashMap<ExecutionPoint, ScriptSource>,
}

impl StaticResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a script to an execution point
    pub fn bind(mut self, point: ExecutionPoint, source: ScriptSource) -> Self {
        self.bindings.insert(point, source);
        self
    }
}

#[async_trait]
impl ScriptResolver for StaticResolver {
    async fn resolve(&self, point: ExecutionPoint) -> Option<ScriptBinding> {
        self.bindings.get(&point).map(|source| ScriptBinding {
            point,
            source: source.clone(),
        })
    }
}
