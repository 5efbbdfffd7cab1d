//! DOM fallback extraction.
//!
//! When the host API is unavailable, media is scraped straight from the
//! post's markup. Four categories are scanned in a fixed order:
//!
//! | Order | Source                | Where the URL comes from                          |
//! |-------|-----------------------|---------------------------------------------------|
//! | 1     | `img-element`         | `<img src>` (absolute http(s), no avatars)        |
//! | 2     | `video-element`       | `<video poster>`, else `<video src>`              |
//! | 3     | `data-attribute`      | `data-src`, `data-background-image`, `data-url`   |
//! | 4     | `background-image`    | inline `style="background-image: url(...)"`       |
//!
//! An element contributes to at most one category: the first one that
//! matches claims it.

use grabline_core::{MediaDescriptor, MediaKind, PostInfo};
use regex::Regex;
use scraper::ElementRef;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::dom;

/// Metadata key recording which category produced a descriptor.
pub const FALLBACK_SOURCE_KEY: &str = "fallbackSource";

/// Image URLs containing any of these are avatars or emoji, not post media.
const EXCLUDED_IMAGE_PATTERNS: [&str; 2] = ["profile_images", "/emoji/"];

/// Data attributes checked in order.
const DATA_ATTRIBUTES: [&str; 3] = ["data-src", "data-background-image", "data-url"];

/// Extensions treated as video when inferring kind from a URL.
const VIDEO_EXTENSIONS: [&str; 4] = [".mp4", ".webm", ".mov", ".m4v"];

static BACKGROUND_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:\s*url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).expect("Invalid regex")
});

static VIDEO_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp4|webm|mov|m4v)(\?[^#]*)?(#.*)?$").expect("Invalid regex"));

// ============================================================================
// Fallback Source
// ============================================================================

/// Markup category a fallback descriptor was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackSource {
    /// `<img src>`.
    ImgElement,
    /// `<video poster|src>`.
    VideoElement,
    /// A `data-*` URL attribute.
    DataAttribute,
    /// An inline `background-image`.
    BackgroundImage,
}

impl FallbackSource {
    /// All categories in scan order.
    pub const ALL: [Self; 4] = [
        Self::ImgElement,
        Self::VideoElement,
        Self::DataAttribute,
        Self::BackgroundImage,
    ];

    /// Returns the value stored under [`FALLBACK_SOURCE_KEY`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImgElement => "img-element",
            Self::VideoElement => "video-element",
            Self::DataAttribute => "data-attribute",
            Self::BackgroundImage => "background-image",
        }
    }
}

impl fmt::Display for FallbackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a DOM scan.
#[derive(Debug, Clone, Default)]
pub struct FallbackOutcome {
    /// Deduplicated descriptors, indexed by position.
    pub items: Vec<MediaDescriptor>,
    /// Position of the clicked item, `0` when undetected.
    pub clicked_index: usize,
    /// Category of each item, parallel to `items`.
    pub sources: Vec<FallbackSource>,
}

impl FallbackOutcome {
    /// Whether anything was found.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Scan
// ============================================================================

struct Candidate<'a> {
    element: ElementRef<'a>,
    source: FallbackSource,
    url: String,
    kind: MediaKind,
    thumbnail: Option<String>,
    alt: Option<String>,
}

/// Scans `container` for media and locates `clicked` among the results.
pub fn extract_from_dom(
    container: ElementRef<'_>,
    clicked: ElementRef<'_>,
    post: Option<&PostInfo>,
) -> FallbackOutcome {
    let mut claimed = HashSet::new();
    let mut candidates = Vec::new();

    for source in FallbackSource::ALL {
        for element in dom::descendant_elements(container) {
            if claimed.contains(&element.id()) {
                continue;
            }
            if let Some(candidate) = candidate_for(source, element) {
                claimed.insert(element.id());
                candidates.push(candidate);
            }
        }
    }

    let clicked_raw = candidates.iter().position(|c| {
        dom::same_node(c.element, clicked) || dom::contains(c.element, clicked) || dom::contains(clicked, c.element)
    });

    let post_id = post.map_or("", |p| p.post_id.as_str());
    let author = post.and_then(|p| p.author_handle.as_deref());

    let mut seen = HashSet::new();
    let mut kept_keys = Vec::new();
    let mut outcome = FallbackOutcome::default();
    let mut clicked_key = None;

    for (raw_index, candidate) in candidates.into_iter().enumerate() {
        let key = dedupe_key(&candidate.url);
        if clicked_raw == Some(raw_index) {
            clicked_key = Some(key.clone());
        }
        if !seen.insert(key.clone()) {
            continue;
        }

        let index = outcome.items.len();
        let mut item = MediaDescriptor::new(format!("fallback-{index}"), candidate.url.clone(), candidate.kind, index, post_id)
            .with_thumbnail(candidate.thumbnail.unwrap_or(candidate.url))
            .with_metadata(FALLBACK_SOURCE_KEY, candidate.source.as_str());
        if let Some(handle) = author {
            item = item.with_author(handle);
        }
        if let Some(alt) = candidate.alt {
            item = item.with_alt_text(alt);
        }

        outcome.items.push(item);
        outcome.sources.push(candidate.source);
        kept_keys.push(key);
    }

    outcome.clicked_index = clicked_key
        .and_then(|key| kept_keys.iter().position(|k| *k == key))
        .unwrap_or(0);

    debug!(
        items = outcome.items.len(),
        clicked_index = outcome.clicked_index,
        clicked_detected = clicked_raw.is_some(),
        "DOM fallback scan complete"
    );
    outcome
}

fn candidate_for(source: FallbackSource, element: ElementRef<'_>) -> Option<Candidate<'_>> {
    match source {
        FallbackSource::ImgElement => {
            if dom::tag_name(&element) != "img" {
                return None;
            }
            let src = dom::non_empty_attr(&element, "src").filter(|s| is_post_image(s))?;
            Some(Candidate {
                element,
                source,
                url: original_image_url(src),
                kind: MediaKind::Image,
                thumbnail: Some(src.to_string()),
                alt: dom::non_empty_attr(&element, "alt").map(str::to_string),
            })
        }
        FallbackSource::VideoElement => {
            if dom::tag_name(&element) != "video" {
                return None;
            }
            let poster = dom::non_empty_attr(&element, "poster");
            let url = poster.or_else(|| dom::non_empty_attr(&element, "src"))?;
            let thumbnail = poster.map_or_else(|| video_thumbnail(url), str::to_string);
            Some(Candidate {
                element,
                source,
                url: url.to_string(),
                kind: MediaKind::Video,
                thumbnail: Some(thumbnail),
                alt: None,
            })
        }
        FallbackSource::DataAttribute => {
            let url = DATA_ATTRIBUTES
                .iter()
                .filter_map(|name| dom::non_empty_attr(&element, name))
                .find(|url| is_absolute_http(url))?;
            Some(inferred(element, source, url))
        }
        FallbackSource::BackgroundImage => {
            let style = element.value().attr("style")?;
            let url = BACKGROUND_IMAGE
                .captures(style)
                .map(|caps| caps[1].trim().to_string())
                .filter(|url| is_absolute_http(url))?;
            Some(inferred(element, source, &url))
        }
    }
}

fn inferred<'a>(element: ElementRef<'a>, source: FallbackSource, url: &str) -> Candidate<'a> {
    Candidate {
        element,
        source,
        url: url.to_string(),
        kind: infer_kind(url),
        thumbnail: None,
        alt: None,
    }
}

// ============================================================================
// URL Helpers
// ============================================================================

fn is_absolute_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn is_post_image(src: &str) -> bool {
    is_absolute_http(src) && !EXCLUDED_IMAGE_PATTERNS.iter().any(|p| src.contains(p))
}

/// Guesses the kind of a bare URL.
pub fn infer_kind(url: &str) -> MediaKind {
    let lower = url.to_ascii_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    if lower.contains("video") || VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        MediaKind::Video
    } else {
        MediaKind::Image
    }
}

/// Rewrites a host media image URL to request the original size.
///
/// URLs outside the host's media path come back unchanged.
pub fn original_image_url(src: &str) -> String {
    let Ok(mut url) = Url::parse(src) else {
        return src.to_string();
    };
    if url.host_str() != Some("pbs.twimg.com") || !url.path().starts_with("/media/") {
        return src.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "name")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut().clear().extend_pairs(kept).append_pair("name", "orig");
    url.to_string()
}

/// Swaps a video file extension for `.jpg`.
fn video_thumbnail(src: &str) -> String {
    VIDEO_FILE.replace(src, ".jpg").into_owned()
}

/// Lower-cased `scheme://host/path` used to spot duplicates.
fn dedupe_key(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => format!(
            "{}://{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or_default(),
            parsed.path()
        )
        .to_lowercase(),
        Err(_) => url.to_lowercase(),
    }
}
