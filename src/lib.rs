//! Sphinx Prebuild
//!
//! Runs documentation extraction tools such as Doxygen before a Sphinx build,
//! with an explicit failure policy and a bounded wait on the external process.

pub mod builder;
pub mod config;
pub mod error;
pub mod extraction;
pub mod hooks;
pub mod process;

pub use builder::{BuildStats, DocBuilder};
pub use config::{BuildConfig, ExtractionConfig, FailurePolicy, RenderConfig, ThemeOptions};
pub use error::{BuildErrorReport, BuildWarning, ConfigError, HookError};
pub use extraction::{resolve_config_path, ExtractionHook};
pub use hooks::{HookContext, HookOutcome, HookReport, PreBuildHook};
pub use process::{ExternalProcess, ProcessError, ProcessOutput};
