//! Pre-build hooks.
//!
//! The build driver owns an ordered list of hooks and calls each one exactly
//! once before the documentation build starts. Hooks only see the build through
//! a [`HookContext`], which hands out shared references.

use async_trait::async_trait;
use std::path::Path;

use crate::config::BuildConfig;
use crate::error::HookError;

/// Read-only view of the build handed to every hook.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub source_dir: &'a Path,
    pub config: &'a BuildConfig,
}

/// How a hook finished when it did not return an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Completed,
    /// Nothing to do, e.g. the tool configuration is missing
    Skipped { reason: String },
    /// The hook failed but the failure policy lets the build continue
    Failed { message: String },
}

impl HookOutcome {
    /// Text this outcome contributes to the build warnings.
    pub fn warning(&self) -> Option<&str> {
        match self {
            HookOutcome::Completed => None,
            HookOutcome::Skipped { reason } => Some(reason),
            HookOutcome::Failed { message } => Some(message),
        }
    }
}

#[async_trait]
pub trait PreBuildHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_build_init(&self, ctx: &HookContext<'_>) -> Result<HookOutcome, HookError>;
}

/// Outcome of one hook as recorded by the build driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookReport {
    pub hook: String,
    pub outcome: HookOutcome,
}
