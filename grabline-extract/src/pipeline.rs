//! Extraction pipeline.
//!
//! Given a post container and the element the user clicked, the pipeline
//! runs the API strategy and, when that fails or finds nothing, the DOM
//! fallback. It never returns an error: every failure ends up in a failed
//! [`ExtractionResult`].

use grabline_core::{ExtractionResult, MediaDescriptor, PostInfo, StrategyMode};
use grabline_fetch::HostApiClient;
use scraper::ElementRef;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::error::ExtractError;
use crate::post::resolve_post_info;
use crate::resolver::resolve_clicked_index;
use crate::strategy::{
    ApiStrategy, ExtractionStrategy, FallbackStrategy, PageContext, StrategyKind, StrategyOutput,
};

/// Strategy name recorded when the API path produced the result.
pub const API_STRATEGY_NAME: &str = "api";

/// Strategy name recorded when the DOM scan produced the result.
pub const FALLBACK_STRATEGY_NAME: &str = "fallback";

/// Strategy name recorded when the DOM scan itself errored.
pub const FALLBACK_FAILED_NAME: &str = "fallback-failed";

// ============================================================================
// Extraction Attempt
// ============================================================================

/// Record of a single strategy run.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    /// The strategy that ran.
    pub strategy: String,
    /// Its mechanism.
    pub kind: StrategyKind,
    /// Whether it produced media.
    pub success: bool,
    /// Error if it did not.
    pub error: Option<String>,
    /// How long it took.
    pub duration: Duration,
}

impl ExtractionAttempt {
    /// Creates a successful attempt record.
    pub fn success(strategy: impl Into<String>, kind: StrategyKind, duration: Duration) -> Self {
        Self {
            strategy: strategy.into(),
            kind,
            success: true,
            error: None,
            duration,
        }
    }

    /// Creates a failed attempt record.
    pub fn failure(
        strategy: impl Into<String>,
        kind: StrategyKind,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            strategy: strategy.into(),
            kind,
            success: false,
            error: Some(error.into()),
            duration,
        }
    }
}

// ============================================================================
// Extraction Outcome
// ============================================================================

/// The result of a pipeline run plus its attempt log.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The result handed to callers.
    pub result: ExtractionResult,
    /// Every strategy run, in order.
    pub attempts: Vec<ExtractionAttempt>,
    /// Total duration.
    pub duration: Duration,
}

impl ExtractionOutcome {
    /// Returns the number of strategies that ran.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns all errors that occurred.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts.iter().filter_map(|a| a.error.as_deref()).collect()
    }
}

// ============================================================================
// Extraction Pipeline
// ============================================================================

/// Runs the API strategy, then the DOM fallback.
pub struct ExtractionPipeline {
    api: Option<Box<dyn ExtractionStrategy>>,
    fallback: Box<dyn ExtractionStrategy>,
}

impl ExtractionPipeline {
    /// Creates a pipeline with only the DOM fallback.
    pub fn new() -> Self {
        Self {
            api: None,
            fallback: Box::new(FallbackStrategy),
        }
    }

    /// Creates a pipeline that tries the host API first.
    pub fn with_api_client(client: Arc<HostApiClient>) -> Self {
        Self::new().with_api_strategy(Box::new(ApiStrategy::new(client)))
    }

    /// Replaces the API strategy.
    pub fn with_api_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.api = Some(strategy);
        self
    }

    /// Replaces the fallback strategy.
    pub fn with_fallback_strategy(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.fallback = strategy;
        self
    }

    /// Returns true if an API strategy is configured.
    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    /// Extracts the media of the post containing `clicked`.
    pub async fn extract(
        &self,
        container: ElementRef<'_>,
        clicked: ElementRef<'_>,
        mode: StrategyMode,
    ) -> ExtractionResult {
        self.extract_with_attempts(container, clicked, mode).await.result
    }

    /// Like [`Self::extract`], also returning the attempt log.
    #[instrument(skip_all, fields(mode = %mode, api = self.api.is_some()))]
    pub async fn extract_with_attempts(
        &self,
        container: ElementRef<'_>,
        clicked: ElementRef<'_>,
        mode: StrategyMode,
    ) -> ExtractionOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let page = PageContext {
            container,
            clicked,
            post: resolve_post_info(container),
        };
        debug!(post = ?page.post, "Resolved post identity");

        let mut api_error = None;

        if mode.allows_api() {
            match &self.api {
                Some(api) => match run(api.as_ref(), &page, &mut attempts).await {
                    Ok(output) => {
                        let clicked_index = output
                            .clicked_index
                            .unwrap_or_else(|| resolve_clicked_index(clicked, &output.items));
                        let post_info = api_post_info(page.post.clone(), &output.items);
                        info!(
                            items = output.items.len(),
                            clicked_index,
                            "Extracted via API"
                        );
                        let result = ExtractionResult::success(API_STRATEGY_NAME, output.items, clicked_index, post_info);
                        return finish(result, attempts, start);
                    }
                    Err(e) => api_error = Some(e),
                },
                None => api_error = Some(ExtractError::NotConfigured(API_STRATEGY_NAME.to_string())),
            }
        }

        if !mode.allows_dom() {
            let error = api_error.unwrap_or_else(|| ExtractError::NotConfigured(API_STRATEGY_NAME.to_string()));
            warn!(error = %error, "API extraction failed and fallback is disabled");
            return finish(
                ExtractionResult::failure(API_STRATEGY_NAME, error.to_string(), page.post),
                attempts,
                start,
            );
        }

        if let Some(error) = &api_error {
            info!(error = %error, "Falling back to DOM extraction");
        }

        let result = match run(self.fallback.as_ref(), &page, &mut attempts).await {
            Ok(output) => {
                let clicked_index = output
                    .clicked_index
                    .unwrap_or_else(|| resolve_clicked_index(clicked, &output.items));
                info!(items = output.items.len(), clicked_index, "Extracted via DOM fallback");
                ExtractionResult::success(FALLBACK_STRATEGY_NAME, output.items, clicked_index, page.post)
            }
            Err(ExtractError::NoMedia) => {
                warn!("DOM fallback found no media");
                ExtractionResult::failure(FALLBACK_STRATEGY_NAME, ExtractError::NoMedia.to_string(), page.post)
            }
            Err(e) => {
                warn!(error = %e, "DOM fallback failed");
                ExtractionResult::failure(FALLBACK_FAILED_NAME, e.to_string(), page.post)
            }
        };

        finish(result, attempts, start)
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one strategy, logs the attempt, and treats an empty list as failure.
async fn run(
    strategy: &dyn ExtractionStrategy,
    page: &PageContext<'_>,
    attempts: &mut Vec<ExtractionAttempt>,
) -> Result<StrategyOutput, ExtractError> {
    let attempt_start = Instant::now();
    debug!(strategy = %strategy.id(), kind = %strategy.kind(), "Executing strategy");

    let result = match strategy.extract(page).await {
        Ok(output) if output.items.is_empty() => Err(ExtractError::NoMedia),
        other => other,
    };
    let duration = attempt_start.elapsed();

    match &result {
        Ok(_) => attempts.push(ExtractionAttempt::success(strategy.id(), strategy.kind(), duration)),
        Err(e) => {
            debug!(strategy = %strategy.id(), error = %e, "Strategy failed");
            attempts.push(ExtractionAttempt::failure(
                strategy.id(),
                strategy.kind(),
                e.to_string(),
                duration,
            ));
        }
    }

    result
}

fn finish(result: ExtractionResult, attempts: Vec<ExtractionAttempt>, start: Instant) -> ExtractionOutcome {
    ExtractionOutcome {
        result,
        attempts,
        duration: start.elapsed(),
    }
}

/// Fills in post identity from the first descriptor when the page lacked it.
fn api_post_info(page_post: Option<PostInfo>, items: &[MediaDescriptor]) -> Option<PostInfo> {
    let first = items.first();
    let info = match page_post {
        Some(info) => info,
        None => PostInfo::new(first.map(|d| d.post_id.clone()).filter(|id| !id.is_empty())?),
    };

    if info.author_handle.is_some() {
        return Some(info);
    }
    match first.and_then(|d| d.author_handle.clone()) {
        Some(handle) => Some(info.with_author(handle)),
        None => Some(info),
    }
}
