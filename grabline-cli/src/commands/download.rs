//! Download command - save the clicked item, or every item, of a post.

use anyhow::Result;
use clap::Args;
use grabline_core::{BulkResult, DownloadPhase, DownloadProgress};
use grabline_fetch::{
    BulkOptions, ByteFetcher, CancelToken, DirectUrlSaver, DirectorySink, DownloadOrchestrator, HostContext,
    HttpClient, PrefetchCache, ProgressCallback, SingleOptions,
};
use grabline_store::{FetchConfig, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::page::{PageArgs, extract_page};
use crate::output::{DownloadOutput, ExtractionOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the download command.
#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub page: PageArgs,

    /// Save every item instead of the clicked one.
    #[arg(long)]
    pub all: bool,

    /// Output directory (defaults to the configured download directory).
    #[arg(long, short, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Worker count for `--all`.
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,
}

/// Runs the download command.
pub async fn run(args: &DownloadArgs, cli: &Cli, store: &SettingsStore) -> Result<ExitCode> {
    let settings = store.get().await;
    let outcome = extract_page(&args.page, &settings).await?;
    let result = &outcome.result;

    let Some(clicked) = result.clicked_item() else {
        match cli.format {
            OutputFormat::Text => {
                if !cli.quiet {
                    println!("{}", TextFormatter::new(cli.use_colors()).format_extraction(result));
                }
            }
            OutputFormat::Json => {
                println!("{}", JsonFormatter::new(cli.pretty).format(&ExtractionOutput::from_outcome(&outcome))?);
            }
        }
        return Ok(ExitCode::NoMedia);
    };

    let mut config = settings.fetch_config();
    if let Some(dir) = &args.out {
        config.download_dir.clone_from(dir);
    }
    let orchestrator = build_orchestrator(&config);
    let token = cancel_on_interrupt();

    let bulk = if args.all {
        let items = result.media_items();
        info!(count = items.len(), dir = %config.download_dir.display(), "Saving all items");
        if let Some(cache) = orchestrator.prefetch_cache() {
            let range = args.concurrency.unwrap_or(config.download.concurrency);
            let ready = cache
                .warm_around(items, result.clicked_index(), range, Some(&token))
                .await;
            debug!(ready, "Clicked item and neighbors fetched ahead");
        }
        let options = BulkOptions {
            token: Some(token),
            on_progress: progress_printer(cli, "items"),
            concurrency: args.concurrency,
            ..BulkOptions::default()
        };
        orchestrator.download_bulk(items, options).await
    } else {
        info!(url = %clicked.url, dir = %config.download_dir.display(), "Saving clicked item");
        let options = SingleOptions {
            token: Some(token),
            on_progress: progress_printer(cli, "bytes"),
            ..SingleOptions::default()
        };
        BulkResult::from_results(vec![orchestrator.download_single(clicked, options).await])
    };

    let output = DownloadOutput::new(result.strategy_name(), &config.download_dir, bulk);
    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet || !output.results.all_succeeded() {
                println!("{}", TextFormatter::new(cli.use_colors()).format_download(&output));
            }
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(if output.results.all_succeeded() {
        ExitCode::Success
    } else {
        ExitCode::DownloadFailed
    })
}

/// Wires the HTTP fetcher, the directory sink, and (when enabled) the direct
/// URL saver into an orchestrator.
///
/// Without the direct saver, downloads go through fetched bytes, so a
/// prefetch cache sharing the fetcher is attached.
pub fn build_orchestrator(config: &FetchConfig) -> DownloadOrchestrator {
    let http = HttpClient::with_timeout(config.request_timeout);
    let fetcher: Arc<dyn ByteFetcher> = Arc::new(http.clone());
    let mut builder = HostContext::builder()
        .fetcher(Arc::clone(&fetcher))
        .sink(Arc::new(DirectorySink::new(config.download_dir.clone())));
    if config.enable_direct_saver {
        builder = builder.saver(Arc::new(DirectUrlSaver::new(http, config.download_dir.clone())));
    }

    let orchestrator = DownloadOrchestrator::with_config(builder.build(), config.download.clone());
    if config.enable_direct_saver {
        orchestrator
    } else {
        let cache = PrefetchCache::with_capacity(fetcher, config.prefetch_capacity);
        orchestrator.with_prefetch_cache(Arc::new(cache))
    }
}

fn cancel_on_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling downloads");
            watcher.cancel("interrupted");
        }
    });
    token
}

fn progress_printer(cli: &Cli, unit: &'static str) -> Option<ProgressCallback> {
    if cli.quiet || cli.format == OutputFormat::Json {
        return None;
    }
    let formatter = TextFormatter::new(cli.use_colors());
    Some(Arc::new(move |progress: DownloadProgress| {
        let line = formatter.format_progress(&progress, unit);
        if progress.phase == DownloadPhase::Complete {
            eprintln!("\r{line}");
        } else {
            eprint!("\r{line}");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabline_store::Settings;

    #[tokio::test]
    async fn test_orchestrator_capabilities_follow_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Settings::default().fetch_config();
        config.download_dir = dir.path().to_path_buf();

        let plain = build_orchestrator(&config);
        assert!(plain.context().can_fetch_and_save());
        assert_eq!(plain.context().capability_names(), vec!["byte_sink", "byte_fetcher"]);

        config.enable_direct_saver = true;
        let direct = build_orchestrator(&config);
        assert_eq!(direct.context().capability_names(), vec!["url_saver", "byte_sink", "byte_fetcher"]);
        assert!(direct.prefetch_cache().is_none());
    }

    #[tokio::test]
    async fn test_prefetch_cache_uses_configured_capacity() {
        let mut settings = Settings::default();
        settings.prefetch_capacity = 7;
        let config = settings.fetch_config();

        let orchestrator = build_orchestrator(&config);
        let cache = orchestrator.prefetch_cache().expect("prefetch cache attached");
        assert_eq!(cache.capacity(), 7);
        assert!(cache.is_empty());
    }
}
