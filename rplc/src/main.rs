//! rplc binary
//!
//! Run with: `rplc check [OPTIONS] <FILE>`

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rplc::{check_program, load_program, CheckerConfig, DefaultScheme};

#[derive(Parser)]
#[command(name = "rplc")]
#[command(about = "Region and effect checker for annotated declaration trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a JSON declaration tree
    Check {
        /// Declaration tree to check
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Default scheme for missing annotations (overrides the config file)
        #[arg(short, long, env = "RPLC_SCHEME")]
        scheme: Option<String>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
    /// List the default schemes
    Schemes,
    /// Print the default configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            file,
            scheme,
            config,
            format,
        } => check(&file, scheme, config, format),
        Commands::Schemes => {
            for scheme in DefaultScheme::ALL {
                println!("{scheme}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", CheckerConfig::default().to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_config(scheme: Option<String>, path: Option<PathBuf>) -> Result<CheckerConfig> {
    let mut config = match &path {
        Some(path) => CheckerConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => CheckerConfig::default(),
    };
    // The scheme is validated by the checker so that it is reported as a diagnostic.
    if let Some(scheme) = scheme {
        config.default_scheme = scheme;
    }
    Ok(config)
}

fn check(file: &Path, scheme: Option<String>, config: Option<PathBuf>, format: Format) -> Result<ExitCode> {
    let config = build_config(scheme, config)?;
    debug!(scheme = %config.default_scheme, "configuration loaded");

    let program = load_program(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let outcome = check_program(&program, &config);

    match format {
        Format::Text => {
            for diagnostic in &outcome.diagnostics {
                println!("{}: {diagnostic}", file.display());
            }
        }
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    let errors = outcome.diagnostics.iter().filter(|d| d.is_error()).count();
    info!(
        "Checked {}: {} diagnostic(s), {} error(s)",
        file.display(),
        outcome.diagnostics.len(),
        errors
    );
    Ok(if errors > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
