//! Filename derivation for saved media.
//!
//! Files are named `{author|"media"}_{postId|epochMs}_{index+1}.{ext}`.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::MediaDescriptor;

/// Extensions recognised in media URLs.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "mp4", "mov", "avi"];

/// Extension used when none can be derived.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Characters that are invalid in filenames on at least one major platform.
static INVALID_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("Invalid regex"));

/// Returns the lower-cased extension for a media URL.
///
/// The path's own extension wins; otherwise a `format=` query parameter is
/// used; otherwise [`DEFAULT_EXTENSION`].
pub fn extension_for_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let (path, query) = match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    };

    let last_segment = path.rsplit('/').next().unwrap_or_default();
    if let Some((_, ext)) = last_segment.rsplit_once('.') {
        let ext = ext.to_lowercase();
        if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
            return ext;
        }
    }

    let format = query.and_then(|q| {
        q.split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "format")
            .map(|(_, value)| value.to_lowercase())
    });
    match format {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => ext,
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Replaces characters that are not allowed in filenames.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = INVALID_CHARS_RE.replace_all(name, "_");
    let trimmed = cleaned.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "media".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builds the filename a descriptor is saved under.
///
/// `now_epoch_ms` stands in for the post id when the descriptor has none.
pub fn suggested_filename(descriptor: &MediaDescriptor, now_epoch_ms: i64) -> String {
    let author = descriptor
        .author_handle
        .as_deref()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or("media");
    let post = if descriptor.post_id.trim().is_empty() {
        now_epoch_ms.to_string()
    } else {
        descriptor.post_id.clone()
    };
    let ext = extension_for_url(&descriptor.url);

    sanitize_filename(&format!("{author}_{post}_{}.{ext}", descriptor.index + 1))
}
