//! Extraction strategy trait and the two built-in strategies.
//!
//! A strategy turns a page context into a descriptor list. The pipeline
//! runs them strictly one after another: the API strategy first, the DOM
//! fallback second.

use async_trait::async_trait;
use grabline_core::{MediaDescriptor, PostInfo};
use grabline_fetch::{CancelToken, HostApiClient};
use scraper::ElementRef;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::ExtractError;
use crate::fallback::extract_from_dom;

// ============================================================================
// Strategy Kind
// ============================================================================

/// The mechanism a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Host API lookup by post id.
    Api,
    /// Scan of the page markup.
    Dom,
}

impl StrategyKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Dom => "DOM",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Page Context
// ============================================================================

/// What a strategy gets to look at.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// The post container.
    pub container: ElementRef<'a>,
    /// The element the user clicked.
    pub clicked: ElementRef<'a>,
    /// Post identity resolved from the container, if any.
    pub post: Option<PostInfo>,
}

/// What a strategy produced.
#[derive(Debug, Clone, Default)]
pub struct StrategyOutput {
    /// Descriptors in presentation order.
    pub items: Vec<MediaDescriptor>,
    /// Clicked position, when the strategy located it itself.
    ///
    /// `None` hands resolution to the clicked-element resolver.
    pub clicked_index: Option<usize>,
}

// ============================================================================
// Strategy Trait
// ============================================================================

/// One way of turning a click into descriptors.
///
/// Page references are not `Send`, so strategy futures are not either.
///
/// ```ignore
/// struct FixedStrategy(Vec<MediaDescriptor>);
///
/// #[async_trait(?Send)]
/// impl ExtractionStrategy for FixedStrategy {
///     fn id(&self) -> &str {
///         "fixed"
///     }
///
///     fn kind(&self) -> StrategyKind {
///         StrategyKind::Dom
///     }
///
///     async fn extract(&self, _page: &PageContext<'_>) -> Result<StrategyOutput, ExtractError> {
///         Ok(StrategyOutput { items: self.0.clone(), clicked_index: None })
///     }
/// }
/// ```
#[async_trait(?Send)]
pub trait ExtractionStrategy: Send + Sync {
    /// Identifier recorded in the attempt log.
    fn id(&self) -> &str;

    /// The kind of mechanism used.
    fn kind(&self) -> StrategyKind;

    /// Runs the strategy.
    async fn extract(&self, page: &PageContext<'_>) -> Result<StrategyOutput, ExtractError>;
}

// ============================================================================
// API Strategy
// ============================================================================

/// Looks the post up through the host API.
pub struct ApiStrategy {
    client: Arc<HostApiClient>,
    token: Option<CancelToken>,
}

impl ApiStrategy {
    /// Creates a strategy around a shared client.
    pub fn new(client: Arc<HostApiClient>) -> Self {
        Self { client, token: None }
    }

    /// Makes lookups abort when `token` is cancelled.
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }
}

#[async_trait(?Send)]
impl ExtractionStrategy for ApiStrategy {
    fn id(&self) -> &str {
        "api"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Api
    }

    async fn extract(&self, page: &PageContext<'_>) -> Result<StrategyOutput, ExtractError> {
        let post = page.post.as_ref().ok_or(ExtractError::MissingPostId)?;
        let items = self.client.fetch_post_media(&post.post_id, self.token.as_ref()).await?;

        if items.is_empty() {
            return Err(ExtractError::NoMedia);
        }

        Ok(StrategyOutput {
            items,
            clicked_index: None,
        })
    }
}

impl fmt::Debug for ApiStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiStrategy")
            .field("client", &self.client)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

// ============================================================================
// Fallback Strategy
// ============================================================================

/// Scans the post markup directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackStrategy;

#[async_trait(?Send)]
impl ExtractionStrategy for FallbackStrategy {
    fn id(&self) -> &str {
        "fallback"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Dom
    }

    async fn extract(&self, page: &PageContext<'_>) -> Result<StrategyOutput, ExtractError> {
        let outcome = extract_from_dom(page.container, page.clicked, page.post.as_ref());
        debug!(items = outcome.items.len(), "Fallback scan finished");

        Ok(StrategyOutput {
            items: outcome.items,
            clicked_index: Some(outcome.clicked_index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_kind_display() {
        assert_eq!(StrategyKind::Api.to_string(), "API");
        assert_eq!(StrategyKind::Dom.display_name(), "DOM");
    }

    #[tokio::test]
    async fn test_fallback_strategy_reports_clicked_index() {
        let doc = Html::parse_fragment(
            r#"<article><img src="https://x.example/a.jpg"><img id="c" src="https://x.example/b.jpg"></article>"#,
        );
        let container = doc.select(&Selector::parse("article").unwrap()).next().unwrap();
        let clicked = doc.select(&Selector::parse("#c").unwrap()).next().unwrap();
        let page = PageContext {
            container,
            clicked,
            post: None,
        };

        let output = FallbackStrategy.extract(&page).await.unwrap();
        assert_eq!(output.items.len(), 2);
        assert_eq!(output.clicked_index, Some(1));
    }
}
