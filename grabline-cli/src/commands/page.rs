//! Loading a saved page, locating the clicked element, and running the
//! extraction pipeline on it.

use anyhow::{Context, Result};
use clap::Args;
use grabline_core::StrategyMode;
use grabline_extract::{ExtractionOutcome, ExtractionPipeline};
use grabline_fetch::{HostApiClient, HttpClient};
use grabline_store::{FetchConfig, Settings};
use scraper::{ElementRef, Html, Selector};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Container selector used when `--container` is not given.
pub const DEFAULT_CONTAINER: &str = "article";

/// Elements treated as clicked when `--click` is not given.
const DEFAULT_CLICK: &str = "img, video";

/// Problems with the page or the selectors pointing into it.
#[derive(Debug, Error)]
pub enum PageError {
    /// A CSS selector did not parse.
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector {
        /// The selector as given.
        selector: String,
        /// Parser message.
        reason: String,
    },

    /// Nothing matched the container selector.
    #[error("No element matches container selector {0:?}")]
    ContainerNotFound(String),

    /// Nothing inside the container matched the click selector.
    #[error("No element inside the container matches {0:?}")]
    ClickedNotFound(String),
}

/// Arguments shared by every command that works on a saved page.
#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Saved HTML page.
    #[arg(long, value_name = "FILE")]
    pub html: PathBuf,

    /// CSS selector of the post container.
    #[arg(long, default_value = DEFAULT_CONTAINER, value_name = "CSS")]
    pub container: String,

    /// CSS selector of the clicked element, searched inside the container.
    /// Defaults to the first image or video.
    #[arg(long, value_name = "CSS")]
    pub click: Option<String>,

    /// Extraction path (auto, api, dom); overrides the configured mode.
    #[arg(long, short)]
    pub strategy: Option<StrategyMode>,
}

/// The container and clicked element of a parsed page.
#[derive(Debug, Clone, Copy)]
pub struct PageSelection<'a> {
    /// The post container.
    pub container: ElementRef<'a>,
    /// The clicked element.
    pub clicked: ElementRef<'a>,
}

/// Reads and parses a saved page.
pub async fn load_document(path: &Path) -> Result<Html> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    debug!(path = %path.display(), bytes = source.len(), "Page loaded");
    Ok(Html::parse_document(&source))
}

/// Locates the container and the clicked element.
///
/// Without a click selector the first image or video in the container is
/// used, and the container itself when it has none.
pub fn select_page<'a>(
    doc: &'a Html,
    container_css: &str,
    click_css: Option<&str>,
) -> Result<PageSelection<'a>, PageError> {
    let container_selector = parse_selector(container_css)?;
    let container = doc
        .select(&container_selector)
        .next()
        .ok_or_else(|| PageError::ContainerNotFound(container_css.to_string()))?;

    let clicked = match click_css {
        Some(css) => {
            let selector = parse_selector(css)?;
            find_within(container, &selector).ok_or_else(|| PageError::ClickedNotFound(css.to_string()))?
        }
        None => {
            let selector = parse_selector(DEFAULT_CLICK)?;
            find_within(container, &selector).unwrap_or(container)
        }
    };

    Ok(PageSelection { container, clicked })
}

fn parse_selector(css: &str) -> Result<Selector, PageError> {
    Selector::parse(css).map_err(|e| PageError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

fn find_within<'a>(container: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    if selector.matches(&container) {
        return Some(container);
    }
    container.select(selector).next()
}

/// Builds the pipeline for `mode`; the host API client is only wired in
/// when the mode can use it.
pub fn build_pipeline(config: &FetchConfig, mode: StrategyMode) -> ExtractionPipeline {
    if !mode.allows_api() {
        return ExtractionPipeline::new();
    }
    let http = HttpClient::with_timeout(config.request_timeout);
    let client = HostApiClient::new(Arc::new(http), config.api.clone(), config.credentials.clone());
    ExtractionPipeline::with_api_client(Arc::new(client))
}

/// Loads the page named by `args` and extracts its media.
pub async fn extract_page(args: &PageArgs, settings: &Settings) -> Result<ExtractionOutcome> {
    let doc = load_document(&args.html).await?;
    let page = select_page(&doc, &args.container, args.click.as_deref())?;
    let mode = args.strategy.unwrap_or(settings.strategy_mode);
    debug!(%mode, clicked = page.clicked.value().name(), "Extracting");

    let pipeline = build_pipeline(&settings.fetch_config(), mode);
    Ok(pipeline.extract_with_attempts(page.container, page.clicked, mode).await)
}
