//! Media descriptor extraction from canonical posts.

use grabline_core::{MediaDescriptor, MediaKind, SourceLocation};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::normalizer::CanonicalPost;

/// Photo URLs ending in a bare image extension.
static PHOTO_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(jpg|jpeg|png|webp|gif)$").expect("Invalid regex"));

/// `/WIDTHxHEIGHT/` path segment used by some CDN URLs.
static DIMENSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d{2,6})x(\d{2,6})/").expect("Invalid regex"));

/// Content type of downloadable video variants.
const MP4_CONTENT_TYPE: &str = "video/mp4";

// ============================================================================
// Raw API Structures
// ============================================================================

/// One entry of a post's `media` array.
#[derive(Debug, Default, Deserialize)]
pub struct RawMedia {
    /// Media id.
    pub id_str: Option<String>,
    /// `photo`, `video` or `animated_gif`.
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    /// Base image URL (the poster for videos).
    pub media_url_https: Option<String>,
    /// Stable media key.
    pub media_key: Option<String>,
    /// Link to the media page.
    pub expanded_url: Option<String>,
    /// Shortened display form of the link.
    pub display_url: Option<String>,
    /// Alt text.
    pub ext_alt_text: Option<String>,
    /// Original pixel size.
    pub original_info: Option<OriginalInfo>,
    /// Video variants.
    pub video_info: Option<VideoInfo>,
}

/// Original dimensions of a media entry.
#[derive(Debug, Default, Deserialize)]
pub struct OriginalInfo {
    /// Width in pixels.
    pub width: Option<u32>,
    /// Height in pixels.
    pub height: Option<u32>,
}

/// Video metadata.
#[derive(Debug, Default, Deserialize)]
pub struct VideoInfo {
    /// Aspect ratio as `[w, h]`.
    #[serde(default)]
    pub aspect_ratio: Vec<u32>,
    /// Available encodings.
    #[serde(default)]
    pub variants: Vec<VideoVariant>,
}

/// One encoding of a video.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoVariant {
    /// MIME type.
    pub content_type: Option<String>,
    /// Bitrate in bits per second.
    pub bitrate: Option<u64>,
    /// Variant URL.
    pub url: String,
}

// ============================================================================
// URL Selection
// ============================================================================

/// Rewrites a photo URL to request the original resolution.
///
/// URLs that already carry a `format=` query are returned unchanged, as are
/// URLs without a recognised extension.
pub fn upgrade_photo_url(url: &str) -> String {
    if url.contains("format=") {
        return url.to_string();
    }
    PHOTO_EXT_RE.replace(url, "?format=$1&name=orig").into_owned()
}

/// Picks the mp4 variant with the highest bitrate; the first one wins ties.
pub fn best_video_variant(variants: &[VideoVariant]) -> Option<&VideoVariant> {
    variants
        .iter()
        .filter(|v| v.content_type.as_deref() == Some(MP4_CONTENT_TYPE))
        .fold(None, |best: Option<&VideoVariant>, current| match best {
            Some(b) if current.bitrate.unwrap_or(0) <= b.bitrate.unwrap_or(0) => Some(b),
            _ => Some(current),
        })
}

fn dimensions_from_url(url: &str) -> Option<(u32, u32)> {
    let caps = DIMENSIONS_RE.captures(url)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

// ============================================================================
// Extraction
// ============================================================================

/// Builds descriptors for every usable media entry of `post`.
///
/// Indices start at `offset` and stay contiguous over the entries that were
/// kept. Entries missing an id, type or base URL are skipped, as are videos
/// without an mp4 variant.
pub fn extract_media(post: &CanonicalPost, source: SourceLocation, offset: usize) -> Vec<MediaDescriptor> {
    let mut items = Vec::with_capacity(post.media.len());
    let mut type_index: HashMap<&'static str, usize> = HashMap::new();

    for (position, value) in post.media.iter().enumerate() {
        let raw = match RawMedia::deserialize(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(position, error = %e, "Skipping malformed media entry");
                continue;
            }
        };

        let (Some(id), Some(media_type), Some(base_url)) =
            (raw.id_str.as_deref(), raw.media_type.as_deref(), raw.media_url_https.as_deref())
        else {
            debug!(position, "Skipping media entry without id, type or URL");
            continue;
        };

        let Some(kind) = MediaKind::from_api_type(media_type) else {
            debug!(position, media_type, "Skipping unknown media type");
            continue;
        };

        let (url, bitrate) = if kind.is_video() {
            let variants = raw.video_info.as_ref().map(|v| v.variants.as_slice()).unwrap_or_default();
            let Some(best) = best_video_variant(variants) else {
                debug!(position, id, "Skipping video without mp4 variant");
                continue;
            };
            (best.url.clone(), best.bitrate)
        } else {
            (upgrade_photo_url(base_url), None)
        };

        let counter = type_index
            .entry(if kind.is_video() { "video" } else { "photo" })
            .or_insert(0);
        let kind_position = *counter;
        *counter += 1;

        let mut descriptor = MediaDescriptor::new(id, url.clone(), kind, offset + items.len(), &post.id)
            .with_original_url(base_url)
            .with_thumbnail(base_url)
            .with_author(&post.author.handle)
            .with_source(source)
            .with_metadata("typeIndex", kind_position.to_string());

        if let Some(key) = raw.media_key.filter(|k| !k.is_empty()) {
            descriptor = descriptor.with_media_key(key);
        }
        if let Some(alt) = raw.ext_alt_text.filter(|a| !a.is_empty()) {
            descriptor = descriptor.with_alt_text(alt);
        }
        if let Some(expanded) = raw.expanded_url {
            descriptor = descriptor.with_metadata("expandedUrl", expanded);
        }
        if let Some(display) = raw.display_url {
            descriptor = descriptor.with_metadata("displayUrl", display);
        }
        if let Some(bitrate) = bitrate {
            descriptor = descriptor.with_metadata("bitrate", bitrate.to_string());
        }

        let original = raw.original_info.unwrap_or_default();
        let from_url = dimensions_from_url(&url);
        let width = original.width.filter(|w| *w > 0).or(from_url.map(|d| d.0));
        let height = original.height.filter(|h| *h > 0).or(from_url.map(|d| d.1));
        if let Some(width) = width {
            descriptor = descriptor.with_metadata("width", width.to_string());
        }
        if let Some(height) = height {
            descriptor = descriptor.with_metadata("height", height.to_string());
        }

        let ratio = raw.video_info.map(|v| v.aspect_ratio).unwrap_or_default();
        match (ratio.first(), ratio.get(1), width, height) {
            (Some(w), Some(h), _, _) if *w > 0 && *h > 0 => {
                descriptor = descriptor.with_metadata("aspectRatio", format!("{w}:{h}"));
            }
            (_, _, Some(w), Some(h)) => {
                descriptor = descriptor.with_metadata("aspectRatio", format!("{w}:{h}"));
            }
            _ => {}
        }

        items.push(descriptor);
    }

    items
}
