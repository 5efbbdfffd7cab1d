//! Extraction result types.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::media::MediaDescriptor;
use crate::error::CoreError;

// ============================================================================
// Strategy Mode
// ============================================================================

/// Which extraction path to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Host API first, DOM scan on failure or empty result.
    #[default]
    Auto,
    /// Host API only.
    Api,
    /// DOM scan only.
    Dom,
}

impl StrategyMode {
    /// Returns true if this mode allows the host API path.
    pub fn allows_api(&self) -> bool {
        matches!(self, Self::Auto | Self::Api)
    }

    /// Returns true if this mode allows the DOM path.
    pub fn allows_dom(&self) -> bool {
        matches!(self, Self::Auto | Self::Dom)
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Api => write!(f, "api"),
            Self::Dom => write!(f, "dom"),
        }
    }
}

impl FromStr for StrategyMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "api" => Ok(Self::Api),
            "dom" | "fallback" => Ok(Self::Dom),
            other => Err(CoreError::UnknownStrategy(other.to_string())),
        }
    }
}

// ============================================================================
// Post Info
// ============================================================================

/// Identity of the post that owns a set of media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInfo {
    /// Post id.
    pub post_id: String,
    /// Author handle, if resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
}

impl PostInfo {
    /// Creates post info without an author.
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            author_handle: None,
        }
    }

    /// Sets the author handle.
    pub fn with_author(mut self, handle: impl Into<String>) -> Self {
        self.author_handle = Some(handle.into());
        self
    }
}

// ============================================================================
// Extraction Result
// ============================================================================

/// Diagnostics attached to an extraction result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    /// Which path produced the result: `api`, `fallback`, or `fallback-failed`.
    pub strategy_name: String,
    /// When the result was produced.
    pub extracted_at_epoch_ms: i64,
    /// Error message for failed results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of turning a click into an ordered list of descriptors.
///
/// Results are immutable once produced; construct them with
/// [`ExtractionResult::success`] or [`ExtractionResult::failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    succeeded: bool,
    media_items: Vec<MediaDescriptor>,
    clicked_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_info: Option<PostInfo>,
    metadata: ExtractionMetadata,
}

impl ExtractionResult {
    /// Creates a successful result.
    ///
    /// A clicked index outside the item list is clamped to 0.
    pub fn success(
        strategy_name: impl Into<String>,
        media_items: Vec<MediaDescriptor>,
        clicked_index: usize,
        post_info: Option<PostInfo>,
    ) -> Self {
        let clicked_index = if clicked_index < media_items.len() {
            clicked_index
        } else {
            0
        };
        Self {
            succeeded: true,
            media_items,
            clicked_index,
            post_info,
            metadata: ExtractionMetadata {
                strategy_name: strategy_name.into(),
                extracted_at_epoch_ms: Utc::now().timestamp_millis(),
                error: None,
            },
        }
    }

    /// Creates a failed result with no media.
    pub fn failure(
        strategy_name: impl Into<String>,
        error: impl Into<String>,
        post_info: Option<PostInfo>,
    ) -> Self {
        Self {
            succeeded: false,
            media_items: Vec::new(),
            clicked_index: 0,
            post_info,
            metadata: ExtractionMetadata {
                strategy_name: strategy_name.into(),
                extracted_at_epoch_ms: Utc::now().timestamp_millis(),
                error: Some(error.into()),
            },
        }
    }

    /// Whether any strategy produced media.
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// The ordered descriptors.
    pub fn media_items(&self) -> &[MediaDescriptor] {
        &self.media_items
    }

    /// Position of the clicked descriptor (0 when unresolved).
    pub fn clicked_index(&self) -> usize {
        self.clicked_index
    }

    /// The clicked descriptor, if any media was found.
    pub fn clicked_item(&self) -> Option<&MediaDescriptor> {
        self.media_items.get(self.clicked_index)
    }

    /// Owning post, when resolved.
    pub fn post_info(&self) -> Option<&PostInfo> {
        self.post_info.as_ref()
    }

    /// Diagnostics.
    pub fn metadata(&self) -> &ExtractionMetadata {
        &self.metadata
    }

    /// Shorthand for `metadata().strategy_name`.
    pub fn strategy_name(&self) -> &str {
        &self.metadata.strategy_name
    }

    /// Consumes the result, returning the descriptors.
    pub fn into_media_items(self) -> Vec<MediaDescriptor> {
        self.media_items
    }
}
