//! Config command - manage configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use grabline_store::{Settings, SettingsStore, default_config_dir, save_json};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write a settings file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli, store: &SettingsStore) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli, store).await?,
        ConfigAction::Path => show_paths(cli, store)?,
        ConfigAction::Init { force } => init_config(*force, store).await?,
        ConfigAction::Reset => reset_config(store).await?,
    }
    Ok(ExitCode::Success)
}

async fn show_config(cli: &Cli, store: &SettingsStore) -> Result<()> {
    let settings = store.get().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(cli.use_colors());
            println!("{}", formatter.format_settings(&settings));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&settings)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli, store: &SettingsStore) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = store.path();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(force: bool, store: &SettingsStore) -> Result<()> {
    let path = store.path();

    if !force && tokio::fs::try_exists(path).await? {
        println!("Settings file already exists: {}", path.display());
        println!("Use --force to overwrite it");
        return Ok(());
    }

    save_json(path, &Settings::default())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Settings initialized");
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

async fn reset_config(store: &SettingsStore) -> Result<()> {
    let path = store.path();

    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_file(path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabline_store::load_json;

    #[tokio::test]
    async fn test_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone());

        init_config(false, &store).await.unwrap();
        let written: Settings = load_json(&path).await.unwrap();
        assert_eq!(written, Settings::default());

        tokio::fs::write(&path, r#"{ "concurrency": 8 }"#).await.unwrap();
        init_config(false, &store).await.unwrap();
        let kept: Settings = load_json(&path).await.unwrap();
        assert_eq!(kept.concurrency, 8);

        init_config(true, &store).await.unwrap();
        let replaced: Settings = load_json(&path).await.unwrap();
        assert_eq!(replaced.concurrency, Settings::default().concurrency);
    }

    #[tokio::test]
    async fn test_reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone());

        init_config(false, &store).await.unwrap();
        reset_config(&store).await.unwrap();
        assert!(!path.exists());

        reset_config(&store).await.unwrap();
    }
}
