use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{BuildConfig, RenderConfig};
use crate::error::{BuildErrorReport, BuildWarning, HookError};
use crate::extraction::ExtractionHook;
use crate::hooks::{HookContext, HookOutcome, HookReport, PreBuildHook};
use crate::process::ExternalProcess;

/// Marker file Doxygen writes at the top of its XML output.
const EXTRACTION_INDEX: &str = "index.xml";

#[derive(Debug, Clone)]
pub struct BuildStats {
    pub started_at: DateTime<Local>,
    pub hooks_run: usize,
    pub hooks_completed: usize,
    pub hooks_skipped: usize,
    pub hooks_failed: usize,
    pub rendered: bool,
    pub build_time: Duration,
    pub warnings: usize,
    pub errors: usize,
    pub warning_details: Vec<BuildWarning>,
    pub error_details: Vec<BuildErrorReport>,
}

impl BuildStats {
    /// One-line account of the build. Individual warnings and errors are
    /// logged where they occur, so they are not repeated here.
    pub fn summary(&self) -> String {
        format!(
            "{} hook(s) run: {} completed, {} skipped, {} failed; \
             {} warning(s), {} error(s) in {:.2?}",
            self.hooks_run,
            self.hooks_completed,
            self.hooks_skipped,
            self.hooks_failed,
            self.warnings,
            self.errors,
            self.build_time
        )
    }
}

/// Drives a documentation build: pre-build hooks, extraction output checks and
/// the optional hand-off to an external renderer.
pub struct DocBuilder {
    config: Arc<BuildConfig>,
    source_dir: PathBuf,
    output_dir: PathBuf,
    hooks: Vec<Box<dyn PreBuildHook>>,
}

impl DocBuilder {
    /// Create a builder with no hooks registered.
    pub fn new(config: Arc<BuildConfig>, source_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            config,
            source_dir,
            output_dir,
            hooks: Vec::new(),
        }
    }

    /// Create a builder with the hooks the configuration enables.
    pub fn from_config(config: Arc<BuildConfig>, source_dir: PathBuf, output_dir: PathBuf) -> Self {
        let extraction = config.extraction.clone();
        let builder = Self::new(config, source_dir, output_dir);
        if extraction.enabled {
            builder.with_hook(Box::new(ExtractionHook::new(extraction)))
        } else {
            builder
        }
    }

    /// Append a hook; hooks run in the order they were added.
    pub fn with_hook(mut self, hook: Box<dyn PreBuildHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Run every registered hook once, in order.
    ///
    /// Stops at the first hook that returns an error.
    pub async fn run_pre_build_hooks(&self) -> Result<Vec<HookReport>> {
        let ctx = HookContext {
            source_dir: &self.source_dir,
            config: &self.config,
        };

        let mut reports = Vec::with_capacity(self.hooks.len());
        for hook in &self.hooks {
            debug!("Running pre-build hook '{}'", hook.name());
            let outcome = hook
                .on_build_init(&ctx)
                .await
                .map_err(|e| hook_failure(hook.name(), e))?;
            reports.push(HookReport {
                hook: hook.name().to_string(),
                outcome,
            });
        }

        Ok(reports)
    }

    pub async fn build(&self) -> Result<BuildStats> {
        let started_at = Local::now();
        let start_time = Instant::now();
        info!("Starting build process...");
        debug!("Pre-build hooks: {:?}", self.hook_names());

        // The renderer runs inside the source dir, so relative paths handed to
        // it would resolve twice.
        let source_dir = std::path::absolute(&self.source_dir).with_context(|| {
            format!("Failed to resolve source directory: {}", self.source_dir.display())
        })?;
        let output_dir = std::path::absolute(&self.output_dir).with_context(|| {
            format!("Failed to resolve output directory: {}", self.output_dir.display())
        })?;

        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        let reports = self.run_pre_build_hooks().await?;
        let mut hooks_completed = 0;
        let mut hooks_skipped = 0;
        let mut hooks_failed = 0;
        for report in &reports {
            match &report.outcome {
                HookOutcome::Completed => hooks_completed += 1,
                HookOutcome::Skipped { .. } => hooks_skipped += 1,
                HookOutcome::Failed { .. } => hooks_failed += 1,
            }
            if let Some(message) = report.outcome.warning() {
                warnings.push(BuildWarning::new(&report.hook, message));
            }
        }

        warnings.extend(self.check_extraction_output(&source_dir));

        let mut rendered = false;
        if let Some(render) = &self.config.render {
            tokio::fs::create_dir_all(&output_dir)
                .await
                .with_context(|| {
                    format!("Failed to create output directory: {}", output_dir.display())
                })?;

            match self.render(render, &source_dir, &output_dir).await {
                Ok(()) => rendered = true,
                Err(e) => {
                    let report = BuildErrorReport::new(&render.program, format!("{:#}", e));
                    error!("{}", report);
                    errors.push(report);
                }
            }
        }

        let build_time = start_time.elapsed();
        let stats = BuildStats {
            started_at,
            hooks_run: reports.len(),
            hooks_completed,
            hooks_skipped,
            hooks_failed,
            rendered,
            build_time,
            warnings: warnings.len(),
            errors: errors.len(),
            warning_details: warnings,
            error_details: errors,
        };

        info!("Build completed in {:?}", build_time);
        Ok(stats)
    }

    /// Whether a finished build should be reported as failed.
    pub fn is_failure(&self, stats: &BuildStats) -> bool {
        stats.errors > 0 || (self.config.fail_on_warning && stats.warnings > 0)
    }

    /// Warn about cross-reference projects whose extraction output is missing.
    fn check_extraction_output(&self, source_dir: &Path) -> Vec<BuildWarning> {
        let mut warnings = Vec::new();
        for (project, dir) in &self.config.breathe.projects {
            let path = source_dir.join(dir);
            let message = if !path.is_dir() {
                format!(
                    "extraction output for project '{}' not found at {}",
                    project,
                    path.display()
                )
            } else if !path.join(EXTRACTION_INDEX).is_file() {
                format!(
                    "extraction output for project '{}' at {} has no {}",
                    project,
                    path.display(),
                    EXTRACTION_INDEX
                )
            } else {
                debug!("Extraction output for '{}' found at {}", project, path.display());
                continue;
            };
            warn!("{}", message);
            warnings.push(BuildWarning::new(project, message));
        }
        warnings
    }

    async fn render(
        &self,
        render: &RenderConfig,
        source_dir: &Path,
        output_dir: &Path,
    ) -> Result<()> {
        let source = source_dir.to_string_lossy();
        let output = output_dir.to_string_lossy();
        let args = render
            .args
            .iter()
            .map(|arg| arg.replace("{source}", &source).replace("{output}", &output));

        info!("Rendering documentation with {}...", render.program);
        let result = ExternalProcess::new(render.program.as_str())
            .args(args)
            .current_dir(source_dir)
            .run()
            .await?;

        if !result.stdout.is_empty() {
            debug!("{} output:\n{}", render.program, result.stdout.trim_end());
        }
        if !result.success() {
            return Err(anyhow!(
                "renderer failed ({}): {}",
                result.describe_status(),
                result.stderr.trim()
            ));
        }

        info!("Rendered documentation into {}", output_dir.display());
        Ok(())
    }
}

fn hook_failure(hook: &str, error: HookError) -> anyhow::Error {
    anyhow::Error::new(error).context(format!("pre-build hook '{}' failed", hook))
}
