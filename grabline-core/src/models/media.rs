//! Media descriptor types.
//!
//! A [`MediaDescriptor`] is produced once per discovered media item and is
//! never mutated afterwards. A new extraction supersedes it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Media Kind
// ============================================================================

/// Kind of media a descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Still image.
    #[default]
    Image,
    /// Video with an audio track.
    Video,
    /// Looping animated image (served as silent video).
    AnimatedImage,
}

impl MediaKind {
    /// Returns true for kinds that are saved as video files.
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video | Self::AnimatedImage)
    }

    /// Maps a host API media `type` field to a kind.
    pub fn from_api_type(value: &str) -> Option<Self> {
        match value {
            "photo" => Some(Self::Image),
            "video" => Some(Self::Video),
            "animated_gif" => Some(Self::AnimatedImage),
            _ => None,
        }
    }

    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::AnimatedImage => "animated image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Source Location
// ============================================================================

/// Where in a post a descriptor was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    /// Attached to the post itself.
    #[default]
    Primary,
    /// Attached to a post quoted by the post.
    Quoted,
}

// ============================================================================
// Media Descriptor
// ============================================================================

/// The canonical record of one discoverable media item.
///
/// `index` is unique and order-stable within one post: primary descriptors
/// come first, quoted-post descriptors follow with indices offset by the
/// primary count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    /// Host-assigned media id, or a synthetic id for DOM-scraped media.
    pub id: String,
    /// Host media key, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_key: Option<String>,
    /// Best URL to download.
    pub url: String,
    /// URL as first observed, before any upgrade.
    pub original_url: String,
    /// Media kind.
    pub kind: MediaKind,
    /// Still preview for video kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// 0-based position within the owning post.
    pub index: usize,
    /// Id of the owning post (empty when unknown).
    pub post_id: String,
    /// Handle of the post author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_handle: Option<String>,
    /// Primary or quoted.
    pub source_location: SourceLocation,
    /// Accessibility text supplied by the author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    /// Free-form diagnostics (dimensions, fallback source, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl MediaDescriptor {
    /// Creates a primary descriptor whose original URL equals its URL.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        kind: MediaKind,
        index: usize,
        post_id: impl Into<String>,
    ) -> Self {
        let url = url.into();
        Self {
            id: id.into(),
            media_key: None,
            original_url: url.clone(),
            url,
            kind,
            thumbnail_url: None,
            index,
            post_id: post_id.into(),
            author_handle: None,
            source_location: SourceLocation::Primary,
            alt_text: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets the media key.
    pub fn with_media_key(mut self, key: impl Into<String>) -> Self {
        self.media_key = Some(key.into());
        self
    }

    /// Sets the original URL.
    pub fn with_original_url(mut self, url: impl Into<String>) -> Self {
        self.original_url = url.into();
        self
    }

    /// Sets the thumbnail URL.
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Sets the author handle.
    pub fn with_author(mut self, handle: impl Into<String>) -> Self {
        self.author_handle = Some(handle.into());
        self
    }

    /// Sets the source location.
    pub fn with_source(mut self, source: SourceLocation) -> Self {
        self.source_location = source;
        self
    }

    /// Sets the alt text.
    pub fn with_alt_text(mut self, text: impl Into<String>) -> Self {
        self.alt_text = Some(text.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns a metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Returns true if this descriptor came from a quoted post.
    pub fn is_quoted(&self) -> bool {
        self.source_location == SourceLocation::Quoted
    }
}
