//! Clicked-element index resolution.
//!
//! Maps the element a user clicked onto a position in an already-extracted
//! descriptor list. Resolution never fails; when nothing matches the answer
//! is `0`.

use grabline_core::MediaDescriptor;
use scraper::ElementRef;
use tracing::debug;

use crate::dom;
use crate::url_match::match_descriptor;

/// How far the resolver looks below and above the clicked element.
pub const MAX_SEARCH_DEPTH: usize = 6;

/// Returns the index of the descriptor the clicked element shows.
///
/// Search order:
///
/// 1. The clicked element itself: an `<img>` by its `src`, a `<video>` by its
///    `poster` (or its `src` when it has no poster)
/// 2. Its descendants, nearest first, up to [`MAX_SEARCH_DEPTH`] levels
/// 3. Its ancestors, up to [`MAX_SEARCH_DEPTH`] levels; each ancestor's whole
///    subtree is searched and the first level with a match wins
pub fn resolve_clicked_index(clicked: ElementRef<'_>, descriptors: &[MediaDescriptor]) -> usize {
    if descriptors.is_empty() {
        return 0;
    }

    if let Some(index) = match_element(&clicked, descriptors) {
        debug!(index, "Clicked element matched directly");
        return index;
    }

    if let Some(index) = dom::descendants_breadth_first(clicked, MAX_SEARCH_DEPTH)
        .iter()
        .find_map(|el| match_element(el, descriptors))
    {
        debug!(index, "Matched a descendant of the clicked element");
        return index;
    }

    for (level, ancestor) in dom::ancestor_elements(clicked, MAX_SEARCH_DEPTH).into_iter().enumerate() {
        if let Some(index) = dom::descendant_elements(ancestor).find_map(|el| match_element(&el, descriptors)) {
            debug!(index, level = level + 1, "Matched inside an ancestor");
            return index;
        }
    }

    debug!("No media matched the clicked element, defaulting to 0");
    0
}

fn match_element(el: &ElementRef<'_>, descriptors: &[MediaDescriptor]) -> Option<usize> {
    dom::media_element_url(el).and_then(|url| match_descriptor(url, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabline_core::MediaKind;
    use scraper::{Html, Selector};

    fn descriptors() -> Vec<MediaDescriptor> {
        vec![
            MediaDescriptor::new("1", "https://pbs.twimg.com/media/a?format=jpg&name=orig", MediaKind::Image, 0, "9"),
            MediaDescriptor::new("2", "https://pbs.twimg.com/media/b?format=jpg&name=orig", MediaKind::Image, 1, "9"),
        ]
    }

    fn resolve(html: &str) -> usize {
        let doc = Html::parse_fragment(html);
        let clicked = doc.select(&Selector::parse("#clicked").unwrap()).next().unwrap();
        resolve_clicked_index(clicked, &descriptors())
    }

    /// Wraps `inner` in `levels` nested divs.
    fn nest(levels: usize, inner: &str) -> String {
        format!("{}{inner}{}", "<div>".repeat(levels), "</div>".repeat(levels))
    }

    #[test]
    fn test_clicked_image() {
        assert_eq!(
            resolve(r#"<img id="clicked" src="https://pbs.twimg.com/media/b.jpg?name=small">"#),
            1
        );
    }

    #[test]
    fn test_video_poster() {
        let items = vec![
            MediaDescriptor::new("v", "https://video.twimg.com/v/1.mp4", MediaKind::Video, 0, "9")
                .with_thumbnail("https://pbs.twimg.com/thumb/1.jpg"),
        ];
        let doc = Html::parse_fragment(r#"<video id="clicked" poster="https://pbs.twimg.com/thumb/1.jpg"></video>"#);
        let clicked = doc.select(&Selector::parse("#clicked").unwrap()).next().unwrap();
        assert_eq!(resolve_clicked_index(clicked, &items), 0);
    }

    #[test]
    fn test_video_poster_preferred_over_src() {
        let items = vec![
            MediaDescriptor::new("v", "https://video.twimg.com/v/1.mp4", MediaKind::Video, 0, "9")
                .with_thumbnail("https://pbs.twimg.com/thumb/1.jpg"),
            MediaDescriptor::new("w", "https://video.twimg.com/v/2.mp4", MediaKind::Video, 1, "9"),
        ];
        let doc = Html::parse_fragment(
            r#"<video id="clicked" poster="https://pbs.twimg.com/thumb/1.jpg" src="https://video.twimg.com/v/2.mp4"></video>"#,
        );
        let clicked = doc.select(&Selector::parse("#clicked").unwrap()).next().unwrap();
        assert_eq!(resolve_clicked_index(clicked, &items), 0);
    }

    #[test]
    fn test_video_without_poster_matches_src() {
        let items = vec![
            MediaDescriptor::new("v", "https://video.twimg.com/v/1.mp4", MediaKind::Video, 0, "9"),
            MediaDescriptor::new("w", "https://video.twimg.com/v/2.mp4?tag=12", MediaKind::Video, 1, "9"),
        ];
        let doc = Html::parse_fragment(r#"<video id="clicked" src="https://video.twimg.com/v/2.mp4"></video>"#);
        let clicked = doc.select(&Selector::parse("#clicked").unwrap()).next().unwrap();
        assert_eq!(resolve_clicked_index(clicked, &items), 1);
    }

    #[test]
    fn test_descendant_within_bound() {
        let html = format!(
            r#"<div id="clicked">{}</div>"#,
            nest(5, r#"<img src="https://pbs.twimg.com/media/b.jpg">"#)
        );
        assert_eq!(resolve(&html), 1);
    }

    #[test]
    fn test_nearest_descendant_wins() {
        let html = format!(
            r#"<div id="clicked">{}<img src="https://pbs.twimg.com/media/b.jpg"></div>"#,
            nest(2, r#"<img src="https://pbs.twimg.com/media/a.jpg">"#)
        );
        assert_eq!(resolve(&html), 1);
    }

    #[test]
    fn test_ancestor_searches_whole_subtree() {
        let html = format!(
            r#"<div><section>{}</section>{}</div>"#,
            nest(4, r#"<img src="https://pbs.twimg.com/media/b.jpg">"#),
            nest(1, r#"<span id="clicked"></span>"#),
        );
        assert_eq!(resolve(&html), 1);
    }

    #[test]
    fn test_ancestor_at_bound() {
        // The shared ancestor is six levels above the clicked element.
        let html = format!(
            r#"<div><img src="https://pbs.twimg.com/media/b.jpg">{}</div>"#,
            nest(5, r#"<span id="clicked"></span>"#)
        );
        assert_eq!(resolve(&html), 1);
    }

    #[test]
    fn test_ancestor_beyond_bound() {
        // Seven levels separate the clicked element from the image's parent.
        let html = format!(
            r#"<div><img src="https://pbs.twimg.com/media/b.jpg">{}</div>"#,
            nest(6, r#"<span id="clicked"></span>"#)
        );
        assert_eq!(resolve(&html), 0);
    }

    #[test]
    fn test_empty_descriptors() {
        let doc = Html::parse_fragment(r#"<img id="clicked" src="https://x/a.jpg">"#);
        let clicked = doc.select(&Selector::parse("#clicked").unwrap()).next().unwrap();
        assert_eq!(resolve_clicked_index(clicked, &[]), 0);
    }
}
