// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Grabline CLI - pull media out of a saved post page from the command line.
//!
//! # Examples
//!
//! ```bash
//! # List the media of the first post, clicked on its first image
//! grabline extract --html saved.html
//!
//! # Click a specific element and skip the host API
//! grabline extract --html saved.html --click '#photo-2' --strategy dom
//!
//! # Save the clicked item
//! grabline download --html saved.html --click '#photo-2'
//!
//! # Save every item of the post into a directory
//! grabline download --html saved.html --all --out ./media
//!
//! # JSON output
//! grabline --format json --pretty extract --html saved.html
//!
//! # Write a settings file with defaults
//! grabline config init
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use grabline_store::{LogLevel, SettingsStore};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::page::PageError;
use commands::{config, download, extract};

// ============================================================================
// CLI Definition
// ============================================================================

/// Grabline CLI - media extraction and download.
#[derive(Parser)]
#[command(name = "grabline")]
#[command(about = "Extract and download the media of a post")]
#[command(long_about = r"
Grabline turns a click on a post into an ordered list of media and saves it.

Extraction paths:
  • api       Host post lookup by id
  • fallback  Scan of the post's images, videos and backgrounds

Examples:
  grabline extract --html saved.html             # Media of the first post
  grabline extract --html saved.html --click img # Click the first image
  grabline download --html saved.html --all      # Save every item
  grabline --format json extract --html saved.html
  grabline config show                           # Current settings
")]
#[command(version)]
#[command(author = "Grabline Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List the media of a post.
    #[command(visible_alias = "x")]
    Extract(extract::ExtractArgs),

    /// Save the clicked item, or every item, of a post.
    #[command(visible_alias = "d")]
    Download(download::DownloadArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No strategy found media.
    NoMedia = 2,
    /// Selector or page could not be used.
    ParseError = 3,
    /// At least one item was not saved.
    DownloadFailed = 4,
}

impl Cli {
    /// Opens the settings store named by `--config`, or the default one.
    pub async fn open_store(&self) -> Result<SettingsStore> {
        let store = match &self.config {
            Some(path) => SettingsStore::load(path.clone()).await?,
            None => SettingsStore::load_default().await?,
        };
        Ok(store)
    }

    /// Returns true if text output should carry ANSI colors.
    pub fn use_colors(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none()
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("grabline=debug,info")
    } else {
        EnvFilter::new(format!("grabline={level}"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    if error.downcast_ref::<PageError>().is_some() {
        ExitCode::ParseError
    } else {
        ExitCode::Error
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = match cli.open_store().await {
        Ok(store) => store,
        Err(e) => {
            setup_logging(cli.verbose, cli.quiet, LogLevel::default());
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(ExitCode::Error as i32);
        }
    };
    setup_logging(cli.verbose, cli.quiet, store.get().await.log_level);

    let result = match &cli.command {
        Commands::Extract(args) => extract::run(args, &cli, &store).await,
        Commands::Download(args) => download::run(args, &cli, &store).await,
        Commands::Config(args) => config::run(args, &cli, &store).await,
    };

    match result {
        Ok(ExitCode::Success) => Ok(()),
        Ok(code) => std::process::exit(code as i32),
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            std::process::exit(exit_code_for(&e) as i32);
        }
    }
}
