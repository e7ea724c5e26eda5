//! Documentation extraction hook.
//!
//! Runs a source-extraction tool such as Doxygen before the documentation build
//! so the cross-reference data the renderer reads is up to date. The tool's
//! configuration file lives next to the documentation source directory, and the
//! tool is run from inside the source directory because it resolves its own
//! paths relative to where it is started.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::{ExtractionConfig, FailurePolicy};
use crate::error::HookError;
use crate::hooks::{HookContext, HookOutcome, PreBuildHook};
use crate::process::{ExternalProcess, ProcessError};

/// Location of the tool configuration for a given source directory.
///
/// Relative names are taken from the parent of `build_root`; absolute paths are
/// returned unchanged.
pub fn resolve_config_path(build_root: &Path, config_file: &Path) -> PathBuf {
    match build_root.parent() {
        Some(parent) => parent.join(config_file),
        None => build_root.join("..").join(config_file),
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionHook {
    settings: ExtractionConfig,
}

impl ExtractionHook {
    pub fn new(settings: ExtractionConfig) -> Self {
        Self { settings }
    }

    /// Run the extraction tool for the documentation rooted at `build_root`.
    pub async fn run(&self, build_root: &Path) -> Result<HookOutcome, HookError> {
        let tool = &self.settings.tool;
        let build_root = build_root
            .canonicalize()
            .map_err(|source| HookError::SourceDir {
                path: build_root.to_path_buf(),
                source,
            })?;

        let config_path = resolve_config_path(&build_root, &self.settings.config_file);
        if !config_path.is_file() {
            let reason = format!(
                "{} configuration not found at {}, skipping extraction",
                tool,
                config_path.display()
            );
            warn!("{}", reason);
            return Ok(HookOutcome::Skipped { reason });
        }

        info!("Running {}...", tool);
        let process = ExternalProcess::new(tool.as_str())
            .arg(config_path.as_os_str())
            .current_dir(&build_root)
            .timeout(self.settings.timeout());

        let output = match process.run().await {
            Ok(output) => output,
            Err(ProcessError::NotFound { .. }) => {
                return self.apply_policy(HookError::ToolNotFound { tool: tool.clone() })
            }
            Err(ProcessError::TimedOut { timeout, .. }) => {
                return self.apply_policy(HookError::ToolTimedOut {
                    tool: tool.clone(),
                    timeout,
                })
            }
            Err(ProcessError::Spawn { source, .. }) | Err(ProcessError::Wait { source, .. }) => {
                return self.apply_policy(HookError::Launch {
                    tool: tool.clone(),
                    source,
                })
            }
        };

        if !output.stdout.is_empty() {
            debug!("{} output:\n{}", tool, output.stdout.trim_end());
        }

        if output.success() {
            info!("{} completed successfully in {:.2?}", tool, output.elapsed);
            return Ok(HookOutcome::Completed);
        }

        let stderr = output.stderr.trim();
        self.apply_policy(HookError::ToolFailed {
            tool: tool.clone(),
            status: output.describe_status(),
            stderr: if stderr.is_empty() {
                "no output on stderr".to_string()
            } else {
                stderr.to_string()
            },
        })
    }

    /// Downgrade tool failures to a warning under the lenient policy. Errors
    /// that mean the environment is broken are always returned.
    fn apply_policy(&self, error: HookError) -> Result<HookOutcome, HookError> {
        if self.settings.failure_policy == FailurePolicy::Strict || !error.is_tool_failure() {
            return Err(error);
        }
        let message = error.to_string();
        warn!("{}", message);
        Ok(HookOutcome::Failed { message })
    }
}

#[async_trait]
impl PreBuildHook for ExtractionHook {
    fn name(&self) -> &str {
        &self.settings.tool
    }

    async fn on_build_init(&self, ctx: &HookContext<'_>) -> Result<HookOutcome, HookError> {
        self.run(ctx.source_dir).await
    }
}
