//! Read-only traversal helpers over a parsed document.
//!
//! Everything here takes [`ElementRef`]s and returns new references; nothing
//! mutates the tree. Depth bounds are explicit parameters.

use scraper::ElementRef;
use std::collections::VecDeque;

/// Returns the lower-cased tag name.
pub fn tag_name<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().name()
}

/// Whether two references point at the same node.
pub fn same_node(a: ElementRef<'_>, b: ElementRef<'_>) -> bool {
    a.id() == b.id()
}

/// Whether `outer` is `inner` or one of its ancestors.
pub fn contains(outer: ElementRef<'_>, inner: ElementRef<'_>) -> bool {
    same_node(outer, inner) || inner.ancestors().any(|node| node.id() == outer.id())
}

/// Element children in document order.
pub fn child_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap)
}

/// All elements below `el` in document order, excluding `el` itself.
pub fn descendant_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// Element ancestors, nearest first, at most `max_levels` of them.
pub fn ancestor_elements(el: ElementRef<'_>, max_levels: usize) -> Vec<ElementRef<'_>> {
    el.ancestors().filter_map(ElementRef::wrap).take(max_levels).collect()
}

/// Elements below `el` up to `max_depth` levels, breadth-first.
///
/// Direct children are depth 1.
pub fn descendants_breadth_first(el: ElementRef<'_>, max_depth: usize) -> Vec<ElementRef<'_>> {
    let mut found = Vec::new();
    let mut queue: VecDeque<(ElementRef<'_>, usize)> = child_elements(el).map(|c| (c, 1)).collect();

    while let Some((node, depth)) = queue.pop_front() {
        found.push(node);
        if depth < max_depth {
            queue.extend(child_elements(node).map(|c| (c, depth + 1)));
        }
    }

    found
}

/// Returns a non-empty, trimmed attribute value.
pub fn non_empty_attr<'a>(el: &ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).map(str::trim).filter(|v| !v.is_empty())
}

/// URL a media element displays: `<img src>`, or `<video poster>`.
///
/// A `<video>` without a poster falls back to its own `src`, so poster-less
/// videos can still be matched against a descriptor's media URL. The poster
/// always wins when both are present.
pub fn media_element_url<'a>(el: &ElementRef<'a>) -> Option<&'a str> {
    match tag_name(el) {
        "img" => non_empty_attr(el, "src"),
        "video" => non_empty_attr(el, "poster").or_else(|| non_empty_attr(el, "src")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        doc.select(&Selector::parse(css).unwrap()).next().unwrap()
    }

    #[test]
    fn test_breadth_first_respects_depth() {
        let doc = Html::parse_fragment(
            r#"<div id="root"><p id="a"><span id="c"><b id="d"></b></span></p><p id="b"></p></div>"#,
        );
        let root = first(&doc, "#root");

        let ids: Vec<_> = descendants_breadth_first(root, 2)
            .iter()
            .filter_map(|e| e.value().attr("id"))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_contains_and_ancestors() {
        let doc = Html::parse_fragment(r#"<div id="outer"><section><img id="pic" src="x"></section></div>"#);
        let outer = first(&doc, "#outer");
        let pic = first(&doc, "#pic");

        assert!(contains(outer, pic));
        assert!(!contains(pic, outer));
        assert!(contains(pic, pic));
        assert_eq!(tag_name(&ancestor_elements(pic, 1)[0]), "section");
    }

    #[test]
    fn test_media_element_url() {
        let doc = Html::parse_fragment(
            r#"<video id="v" poster="https://x/p.jpg" src="https://x/v.mp4"></video><video id="w" src=" https://x/w.mp4 "></video>"#,
        );
        assert_eq!(media_element_url(&first(&doc, "#v")), Some("https://x/p.jpg"));
        assert_eq!(media_element_url(&first(&doc, "#w")), Some("https://x/w.mp4"));
    }

    #[test]
    fn test_media_element_url_other_tags() {
        let doc = Html::parse_fragment(
            r#"<img id="i" src=""><video id="n"></video><a id="a" href="https://x/a.jpg" src="https://x/a.jpg"></a>"#,
        );
        assert_eq!(media_element_url(&first(&doc, "#i")), None);
        assert_eq!(media_element_url(&first(&doc, "#n")), None);
        assert_eq!(media_element_url(&first(&doc, "#a")), None);
    }
}
