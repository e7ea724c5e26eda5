use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use sphinx_prebuild::{BuildConfig, DocBuilder, ExtractionHook, FailurePolicy};

#[derive(Parser)]
#[command(name = "sphinx-prebuild")]
#[command(about = "Run documentation extraction tools before a Sphinx build")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pre-build hooks, check extraction output and render
    Build {
        /// Documentation source directory
        source: PathBuf,

        /// Output directory (defaults to SOURCE/_build/html)
        output: Option<PathBuf>,

        /// Abort when the extraction tool fails
        #[arg(long)]
        strict: bool,

        /// Extraction timeout in seconds (0 disables it)
        #[arg(long)]
        timeout: Option<u64>,

        /// Do not run the extraction tool
        #[arg(long)]
        no_extraction: bool,

        /// Treat warnings as errors
        #[arg(long)]
        fail_on_warning: bool,
    },

    /// Run only the extraction tool
    Extract {
        /// Documentation source directory
        source: PathBuf,

        /// Abort when the extraction tool fails
        #[arg(long)]
        strict: bool,

        /// Extraction timeout in seconds (0 disables it)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print the effective configuration
    Config {
        /// Documentation source directory used for config discovery
        source: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Toml)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Toml,
    Yaml,
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Build {
            source,
            output,
            strict,
            timeout,
            no_extraction,
            fail_on_warning,
        } => {
            let mut config = load_config(cli.config.as_deref(), Some(&source))?;
            apply_extraction_overrides(&mut config, strict, timeout);
            if no_extraction {
                config.extraction.enabled = false;
            }
            if fail_on_warning {
                config.fail_on_warning = true;
            }

            let output = output.unwrap_or_else(|| source.join("_build").join("html"));
            let builder = DocBuilder::from_config(Arc::new(config), source, output);
            let stats = builder.build().await?;

            // Warnings and errors were logged as they happened.
            for warning in &stats.warning_details {
                debug!("{}", warning);
            }
            for report in &stats.error_details {
                debug!("{}", report);
            }
            info!("{}", stats.summary());

            if builder.is_failure(&stats) {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Commands::Extract {
            source,
            strict,
            timeout,
        } => {
            let mut config = load_config(cli.config.as_deref(), Some(&source))?;
            apply_extraction_overrides(&mut config, strict, timeout);

            ExtractionHook::new(config.extraction).run(&source).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { source, format } => {
            let config = load_config(cli.config.as_deref(), source.as_deref())?;
            let rendered = match format {
                OutputFormat::Toml => toml::to_string_pretty(&config)?,
                OutputFormat::Yaml => serde_yaml::to_string(&config)?,
                OutputFormat::Json => serde_json::to_string_pretty(&config)?,
            };
            println!("{}", rendered);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(explicit: Option<&Path>, source: Option<&Path>) -> Result<BuildConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => source.and_then(BuildConfig::discover),
    };

    match &path {
        Some(path) => info!("Loading configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    BuildConfig::load(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("Invalid configuration in {}", path.display()),
        None => "Invalid configuration".to_string(),
    })
}

fn apply_extraction_overrides(config: &mut BuildConfig, strict: bool, timeout: Option<u64>) {
    if strict {
        config.extraction.failure_policy = FailurePolicy::Strict;
    }
    if let Some(secs) = timeout {
        config.extraction.timeout_secs = secs;
    }
}
