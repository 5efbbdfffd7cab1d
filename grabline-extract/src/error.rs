//! Extraction error types.

use grabline_fetch::FetchError;
use thiserror::Error;

/// Errors raised by a single extraction strategy.
///
/// These never escape [`crate::ExtractionPipeline`]; the pipeline folds them
/// into a failed [`grabline_core::ExtractionResult`].
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// No post id could be found in or around the container.
    #[error("No post id found in container")]
    MissingPostId,

    /// The strategy ran but found nothing.
    #[error("No media found")]
    NoMedia,

    /// The host API lookup failed.
    #[error("API lookup failed: {0}")]
    Api(#[from] FetchError),

    /// The strategy is not configured.
    #[error("Strategy not configured: {0}")]
    NotConfigured(String),

    /// Anything else a custom strategy reports.
    #[error("{0}")]
    Other(String),
}
