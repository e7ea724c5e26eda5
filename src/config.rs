//! Build configuration.
//!
//! A [`BuildConfig`] is assembled once per process from an optional file
//! (TOML, YAML or JSON, picked by extension), then `SPHINX_PREBUILD_*`
//! environment variables, then command-line overrides. After that it is
//! shared behind an `Arc` and only ever read.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// File name probed when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sphinx-prebuild.toml";

/// Prefix for environment overrides, e.g. `SPHINX_PREBUILD_EXTRACTION__TIMEOUT_SECS`.
pub const ENV_PREFIX: &str = "SPHINX_PREBUILD";

lazy_static! {
    static ref HEX_COLOR: Regex = Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").unwrap();
}

const BUTTON_LOCATIONS: &[&str] = &["bottom", "top", "both", "none"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub project: String,
    pub copyright: String,
    pub author: String,
    pub version: String,
    pub release: String,
    pub extensions: Vec<String>,
    pub templates_path: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub fail_on_warning: bool,
    pub html: HtmlConfig,
    pub breathe: BreatheConfig,
    pub extraction: ExtractionConfig,
    pub render: Option<RenderConfig>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project: "Project".to_string(),
            copyright: String::new(),
            author: String::new(),
            version: "0.0.1".to_string(),
            release: "0.0.1".to_string(),
            extensions: vec![
                "breathe".to_string(),
                "sphinx.ext.autodoc".to_string(),
                "sphinx.ext.intersphinx".to_string(),
                "sphinx.ext.todo".to_string(),
                "sphinx.ext.viewcode".to_string(),
            ],
            templates_path: vec!["_templates".to_string()],
            exclude_patterns: vec![
                "_build".to_string(),
                "_doxygen".to_string(),
                "Thumbs.db".to_string(),
                ".DS_Store".to_string(),
            ],
            fail_on_warning: false,
            html: HtmlConfig::default(),
            breathe: BreatheConfig::default(),
            extraction: ExtractionConfig::default(),
            render: None,
        }
    }
}

/// HTML output options. Passed through to the renderer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlConfig {
    pub theme: String,
    pub static_path: Vec<String>,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub theme_options: ThemeOptions,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self {
            theme: "sphinx_rtd_theme".to_string(),
            static_path: vec!["_static".to_string()],
            logo: None,
            favicon: None,
            theme_options: ThemeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeOptions {
    pub logo_only: bool,
    pub display_version: bool,
    pub prev_next_buttons_location: String,
    pub style_external_links: bool,
    pub style_nav_header_background: String,
    pub collapse_navigation: bool,
    pub sticky_navigation: bool,
    /// -1 means unlimited
    pub navigation_depth: i32,
    pub includehidden: bool,
    pub titles_only: bool,
}

impl Default for ThemeOptions {
    fn default() -> Self {
        Self {
            logo_only: false,
            display_version: true,
            prev_next_buttons_location: "bottom".to_string(),
            style_external_links: false,
            style_nav_header_background: "#2980B9".to_string(),
            collapse_navigation: true,
            sticky_navigation: true,
            navigation_depth: 4,
            includehidden: true,
            titles_only: false,
        }
    }
}

/// Cross-reference projects fed by the extraction tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreatheConfig {
    /// Project identifier -> extraction output directory, relative to the source dir
    pub projects: BTreeMap<String, PathBuf>,
    pub default_project: Option<String>,
}

/// What happens when the extraction tool runs but does not succeed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and keep building
    #[default]
    Lenient,
    /// Abort the build
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub tool: String,
    /// Resolved against the parent of the documentation source directory
    pub config_file: PathBuf,
    pub failure_policy: FailurePolicy,
    /// Zero disables the bound
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tool: "doxygen".to_string(),
            config_file: PathBuf::from("Doxyfile"),
            failure_policy: FailurePolicy::Lenient,
            timeout_secs: 600,
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

/// External renderer invoked after the pre-build hooks.
///
/// `{source}` and `{output}` in `args` are replaced with the build directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl BuildConfig {
    /// Load configuration from `path` (if any) layered with environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: BuildConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Find a configuration file for a documentation source directory.
    ///
    /// Looks in the source directory first, then in its parent.
    pub fn discover(source_dir: &Path) -> Option<PathBuf> {
        let candidates = [
            Some(source_dir.join(DEFAULT_CONFIG_FILE)),
            source_dir.parent().map(|p| p.join(DEFAULT_CONFIG_FILE)),
        ];
        candidates.into_iter().flatten().find(|p| p.is_file())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.trim().is_empty() {
            return Err(ConfigError::invalid("project", "must not be empty"));
        }

        let options = &self.html.theme_options;
        if options.navigation_depth < -1 {
            return Err(ConfigError::invalid(
                "html.theme_options.navigation_depth",
                format!("{} is below -1", options.navigation_depth),
            ));
        }
        if !HEX_COLOR.is_match(&options.style_nav_header_background) {
            return Err(ConfigError::invalid(
                "html.theme_options.style_nav_header_background",
                format!(
                    "'{}' is not a #rgb or #rrggbb colour",
                    options.style_nav_header_background
                ),
            ));
        }
        if !BUTTON_LOCATIONS.contains(&options.prev_next_buttons_location.as_str()) {
            return Err(ConfigError::invalid(
                "html.theme_options.prev_next_buttons_location",
                format!(
                    "'{}' is not one of {:?}",
                    options.prev_next_buttons_location, BUTTON_LOCATIONS
                ),
            ));
        }

        if let Some(default) = &self.breathe.default_project {
            if !self.breathe.projects.contains_key(default) {
                return Err(ConfigError::invalid(
                    "breathe.default_project",
                    format!("'{}' is not listed in breathe.projects", default),
                ));
            }
        }

        if self.extraction.enabled {
            if self.extraction.tool.trim().is_empty() {
                return Err(ConfigError::invalid("extraction.tool", "must not be empty"));
            }
            if self.extraction.config_file.as_os_str().is_empty() {
                return Err(ConfigError::invalid(
                    "extraction.config_file",
                    "must not be empty",
                ));
            }
        }

        if let Some(render) = &self.render {
            if render.program.trim().is_empty() {
                return Err(ConfigError::invalid("render.program", "must not be empty"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = BuildConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extraction.tool, "doxygen");
        assert_eq!(config.extraction.config_file, PathBuf::from("Doxyfile"));
        assert_eq!(config.extraction.failure_policy, FailurePolicy::Lenient);
        assert_eq!(config.extraction.timeout(), Some(Duration::from_secs(600)));
        assert!(config.render.is_none());
    }

    #[test]
    fn test_zero_timeout_disables_bound() {
        let extraction = ExtractionConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(extraction.timeout(), None);
    }

    #[test]
    fn test_load_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sphinx-prebuild.toml");
        std::fs::write(
            &path,
            r##"
project = "Citrus Engine"
author = "Citrus Engine Contributors"

[html.theme_options]
style_nav_header_background = "#ff8c00"
collapse_navigation = false

[breathe]
default_project = "citrus"

[breathe.projects]
citrus = "_doxygen/xml"

[extraction]
failure_policy = "strict"
timeout_secs = 30
"##,
        )
        .unwrap();

        let config = BuildConfig::load(Some(&path)).unwrap();
        assert_eq!(config.project, "Citrus Engine");
        assert_eq!(config.html.theme_options.style_nav_header_background, "#ff8c00");
        assert!(!config.html.theme_options.collapse_navigation);
        // untouched keys keep their defaults
        assert!(config.html.theme_options.sticky_navigation);
        assert_eq!(config.html.theme, "sphinx_rtd_theme");
        assert_eq!(
            config.breathe.projects.get("citrus"),
            Some(&PathBuf::from("_doxygen/xml"))
        );
        assert_eq!(config.extraction.failure_policy, FailurePolicy::Strict);
        assert_eq!(config.extraction.timeout_secs, 30);
    }

    #[test]
    fn test_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prebuild.yaml");
        std::fs::write(
            &path,
            "project: docs\nrender:\n  program: sphinx-build\n  args: [\"-b\", \"html\", \"{source}\", \"{output}\"]\n",
        )
        .unwrap();

        let config = BuildConfig::load(Some(&path)).unwrap();
        let render = config.render.unwrap();
        assert_eq!(render.program, "sphinx-build");
        assert_eq!(render.args.len(), 4);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = BuildConfig::load(Some(&temp_dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_invalid_header_colour() {
        let mut config = BuildConfig::default();
        config.html.theme_options.style_nav_header_background = "orange".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("style_nav_header_background"));
    }

    #[test]
    fn test_navigation_depth_bounds() {
        let mut config = BuildConfig::default();
        config.html.theme_options.navigation_depth = -1;
        assert!(config.validate().is_ok());
        config.html.theme_options.navigation_depth = -2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_project_must_exist() {
        let mut config = BuildConfig::default();
        config.breathe.default_project = Some("engine".to_string());
        assert!(config.validate().is_err());

        config
            .breathe
            .projects
            .insert("engine".to_string(), PathBuf::from("_doxygen/xml"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_tool_rejected_only_when_enabled() {
        let mut config = BuildConfig::default();
        config.extraction.tool = String::new();
        assert!(config.validate().is_err());

        config.extraction.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_discover_prefers_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        let docs = temp_dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        assert_eq!(BuildConfig::discover(&docs), None);

        std::fs::write(temp_dir.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
        assert_eq!(
            BuildConfig::discover(&docs),
            Some(temp_dir.path().join(DEFAULT_CONFIG_FILE))
        );

        std::fs::write(docs.join(DEFAULT_CONFIG_FILE), "").unwrap();
        assert_eq!(
            BuildConfig::discover(&docs),
            Some(docs.join(DEFAULT_CONFIG_FILE))
        );
    }
}
