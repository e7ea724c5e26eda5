//! Error types and build diagnostics.
//!
//! Hooks report typed [`HookError`]s; the build driver turns hook outcomes into
//! [`BuildWarning`]s and [`BuildErrorReport`]s that end up in the build stats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by a pre-build hook.
#[derive(Debug, Error)]
pub enum HookError {
    /// The extraction tool could not be located. Always fatal.
    #[error(
        "extraction tool '{tool}' was not found on PATH; install it or point \
         `extraction.tool` at the executable"
    )]
    ToolNotFound { tool: String },

    #[error("extraction tool '{tool}' failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("extraction tool '{tool}' did not finish within {timeout:?}")]
    ToolTimedOut { tool: String, timeout: Duration },

    #[error("failed to launch extraction tool '{tool}': {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("documentation source directory {} is not accessible: {source}", path.display())]
    SourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HookError {
    /// Whether the failure policy may downgrade this error to a warning.
    ///
    /// A missing tool or source directory means the environment is broken and
    /// is reported regardless of policy.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            HookError::ToolFailed { .. } | HookError::ToolTimedOut { .. } | HookError::Launch { .. }
        )
    }
}

/// Errors raised while loading or validating the build configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration value for `{key}`: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// A non-fatal problem recorded during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWarning {
    /// Hook or build step that produced the warning
    pub origin: String,
    pub message: String,
}

impl BuildWarning {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WARNING [{}]: {}", self.origin, self.message)
    }
}

/// A problem that makes the build fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildErrorReport {
    pub origin: String,
    pub message: String,
}

impl BuildErrorReport {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BuildErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR [{}]: {}", self.origin, self.message)
    }
}
