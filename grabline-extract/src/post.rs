//! Post identity resolution from the page.

use grabline_core::PostInfo;
use regex::Regex;
use scraper::ElementRef;
use std::sync::LazyLock;

use crate::dom;

/// Matches `/{handle}/status/{id}` in a link.
static STATUS_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Za-z0-9_]{1,15})/status/(\d+)").expect("Invalid regex"));

/// Attributes that carry a post id directly.
const ID_ATTRIBUTES: [&str; 2] = ["data-post-id", "data-tweet-id"];

/// Path segment used by permalinks that carry no author.
const ANONYMOUS_SEGMENT: &str = "i";

/// Finds the post a container belongs to.
///
/// Looks for an explicit id attribute on the container or inside it, then
/// for the first status permalink. The author handle comes from that link.
pub fn resolve_post_info(container: ElementRef<'_>) -> Option<PostInfo> {
    let link = status_link(container);

    let explicit_id = std::iter::once(container)
        .chain(dom::descendant_elements(container))
        .find_map(|el| ID_ATTRIBUTES.iter().find_map(|name| dom::non_empty_attr(&el, name)))
        .filter(|id| id.bytes().all(|b| b.is_ascii_digit()));

    let (post_id, handle) = match (explicit_id, link) {
        (Some(id), Some((handle, link_id))) if link_id == id => (link_id, handle),
        (Some(id), _) => (id.to_string(), None),
        (None, Some((handle, id))) => (id, handle),
        (None, None) => return None,
    };

    let info = PostInfo::new(post_id);
    Some(match handle {
        Some(handle) => info.with_author(handle),
        None => info,
    })
}

/// Returns the handle and post id of the first status link in the container.
fn status_link(container: ElementRef<'_>) -> Option<(Option<String>, String)> {
    std::iter::once(container)
        .chain(dom::descendant_elements(container))
        .filter(|el| dom::tag_name(el) == "a")
        .filter_map(|el| dom::non_empty_attr(&el, "href"))
        .find_map(|href| {
            let caps = STATUS_LINK.captures(href)?;
            let handle = (&caps[1] != ANONYMOUS_SEGMENT).then(|| caps[1].to_string());
            Some((handle, caps[2].to_string()))
        })
}
