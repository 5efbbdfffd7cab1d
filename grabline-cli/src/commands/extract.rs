//! Extract command - list the media of a post.

use anyhow::Result;
use clap::Args;
use grabline_store::SettingsStore;

use super::page::{PageArgs, extract_page};
use crate::output::{ExtractionOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub page: PageArgs,
}

/// Runs the extract command.
pub async fn run(args: &ExtractArgs, cli: &Cli, store: &SettingsStore) -> Result<ExitCode> {
    let settings = store.get().await;
    let outcome = extract_page(&args.page, &settings).await?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(cli.use_colors());
            if !cli.quiet || outcome.result.succeeded() {
                println!("{}", formatter.format_extraction(&outcome.result));
            }
            if cli.verbose {
                println!();
                println!("{}", formatter.format_attempts(&outcome.attempts));
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&ExtractionOutput::from_outcome(&outcome))?);
        }
    }

    Ok(if outcome.result.succeeded() {
        ExitCode::Success
    } else {
        ExitCode::NoMedia
    })
}
