//! Media URL normalization and matching.
//!
//! The page and the host API refer to the same asset with different URLs:
//! `https://pbs.twimg.com/media/a.jpg` on one side and
//! `https://pbs.twimg.com/media/a?format=jpg&name=large` on the other. Both
//! normalize to `https://pbs.twimg.com/media/a`.

use grabline_core::MediaDescriptor;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Legacy `:large` / `:orig` size suffix.
static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[A-Za-z0-9]+$").expect("Invalid regex"));

/// Reduces a media URL to `scheme://host/path` without query, fragment,
/// size suffix, or file extension.
///
/// Unparseable input is treated as a bare path.
pub fn normalize_media_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let (origin, path) = match Url::parse(trimmed) {
        Ok(url) => (
            format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default()),
            url.path().to_string(),
        ),
        Err(_) => {
            let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
            (String::new(), trimmed[..end].to_string())
        }
    };

    let path = SIZE_SUFFIX.replace(&path, "");
    format!("{origin}{}", strip_extension(&path))
}

fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    }
}

/// Finds the descriptor a page URL refers to.
///
/// Exact matches on `url`, `original_url`, or `thumbnail_url` win over
/// normalized matches.
pub fn match_descriptor(page_url: &str, descriptors: &[MediaDescriptor]) -> Option<usize> {
    if page_url.is_empty() {
        return None;
    }

    let exact = descriptors.iter().position(|d| {
        d.url == page_url || d.original_url == page_url || d.thumbnail_url.as_deref() == Some(page_url)
    });
    if exact.is_some() {
        return exact;
    }

    let wanted = normalize_media_url(page_url);
    descriptors.iter().position(|d| {
        normalize_media_url(&d.url) == wanted
            || d.thumbnail_url
                .as_deref()
                .is_some_and(|thumb| normalize_media_url(thumb) == wanted)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabline_core::MediaKind;

    #[test]
    fn test_extension_and_query_forms_match() {
        assert_eq!(
            normalize_media_url("https://pbs.twimg.com/media/a.jpg"),
            normalize_media_url("https://pbs.twimg.com/media/a?format=jpg&name=large"),
        );
        assert_eq!(
            normalize_media_url("https://pbs.twimg.com/media/a.jpg"),
            "https://pbs.twimg.com/media/a"
        );
    }

    #[test]
    fn test_size_suffix_and_fragment() {
        assert_eq!(
            normalize_media_url("https://pbs.twimg.com/media/a.jpg:large#top"),
            "https://pbs.twimg.com/media/a"
        );
    }

    #[test]
    fn test_dots_in_directories_survive() {
        assert_eq!(normalize_media_url("https://x.com/v1.2/clip"), "https://x.com/v1.2/clip");
        assert_eq!(normalize_media_url("/media/b.png?x=1"), "/media/b");
    }

    #[test]
    fn test_distinct_assets_differ() {
        assert_ne!(
            normalize_media_url("https://pbs.twimg.com/media/a.jpg"),
            normalize_media_url("https://pbs.twimg.com/media/b.jpg"),
        );
    }

    #[test]
    fn test_match_descriptor_prefers_exact() {
        let items = vec![
            MediaDescriptor::new("1", "https://pbs.twimg.com/media/a?format=jpg&name=orig", MediaKind::Image, 0, "9"),
            MediaDescriptor::new("2", "https://video.twimg.com/v/clip.mp4", MediaKind::Video, 1, "9")
                .with_thumbnail("https://pbs.twimg.com/ext_tw_video_thumb/clip.jpg"),
        ];

        assert_eq!(match_descriptor("https://pbs.twimg.com/media/a.jpg", &items), Some(0));
        assert_eq!(
            match_descriptor("https://pbs.twimg.com/ext_tw_video_thumb/clip.jpg", &items),
            Some(1)
        );
        assert_eq!(match_descriptor("https://pbs.twimg.com/media/zzz.jpg", &items), None);
        assert_eq!(match_descriptor("", &items), None);
    }
}
