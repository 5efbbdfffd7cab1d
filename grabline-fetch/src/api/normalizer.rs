//! Post normalization.
//!
//! The host API returns a post in one of two shapes:
//!
//! ```text
//! legacy:  { "id_str": "1", "full_text": "..", "extended_entities": { "media": [..] }, "user": {..} }
//! current: { "rest_id": "1", "legacy": { "full_text": "..", "extended_entities": {..} },
//!            "core": { "user_results": { "result": { "legacy": { "screen_name": ".." } } } } }
//! ```
//!
//! and the current shape may be wrapped once more under a `tweet` key.
//! [`normalize_post`] reduces both to a [`CanonicalPost`].

use serde_json::Value;
use tracing::debug;

// ============================================================================
// Canonical Shapes
// ============================================================================

/// Author of a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalAuthor {
    /// Handle without the leading `@`.
    pub handle: String,
    /// Display name, when present.
    pub name: Option<String>,
}

/// A post reduced to the fields the pipeline reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPost {
    /// Post id.
    pub id: String,
    /// Full text (long-form text preferred).
    pub text: String,
    /// Raw media entries.
    pub media: Vec<Value>,
    /// Resolved author.
    pub author: CanonicalAuthor,
    /// Raw quoted post node, not yet normalized.
    pub quoted: Option<Value>,
}

// ============================================================================
// Lookup
// ============================================================================

/// Finds the post node inside a full API response.
pub fn locate_post(response: &Value) -> Option<&Value> {
    let data = response.get("data")?;
    data.pointer("/tweetResult/result")
        .or_else(|| data.pointer("/tweet_result/result"))
        .or_else(|| data.get("tweetResult"))
        .filter(|node| node.is_object())
}

/// Reduces a raw post node to its canonical shape.
///
/// Returns `None` when no author handle can be resolved; callers treat that
/// as a schema mismatch.
pub fn normalize_post(node: &Value) -> Option<CanonicalPost> {
    let post = node.get("tweet").filter(|t| t.is_object()).unwrap_or(node);
    let legacy = post.get("legacy");

    let field = |name: &str| post.get(name).or_else(|| legacy.and_then(|l| l.get(name)));

    let Some(author) = normalize_author(post) else {
        debug!("Post has no resolvable author");
        return None;
    };

    let id = string_at(post, "rest_id")
        .or_else(|| field("id_str").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();

    let text = post
        .pointer("/note_tweet/note_tweet_results/result/text")
        .and_then(Value::as_str)
        .or_else(|| field("full_text").and_then(Value::as_str))
        .or_else(|| field("text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let media = field("extended_entities")
        .and_then(|e| e.get("media"))
        .or_else(|| field("entities").and_then(|e| e.get("media")))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let quoted = post
        .pointer("/quoted_status_result/result")
        .filter(|q| q.is_object())
        .cloned();

    Some(CanonicalPost {
        id,
        text,
        media,
        author,
        quoted,
    })
}

fn normalize_author(post: &Value) -> Option<CanonicalAuthor> {
    let user = post
        .pointer("/core/user_results/result")
        .or_else(|| post.get("user"))
        .filter(|u| u.is_object())?;

    let handle = string_at(user, "screen_name")
        .or_else(|| user.pointer("/legacy/screen_name").and_then(Value::as_str).map(str::to_string))
        .or_else(|| user.pointer("/core/screen_name").and_then(Value::as_str).map(str::to_string))
        .filter(|h| !h.is_empty())?;

    let name = string_at(user, "name")
        .or_else(|| user.pointer("/legacy/name").and_then(Value::as_str).map(str::to_string))
        .or_else(|| user.pointer("/core/name").and_then(Value::as_str).map(str::to_string));

    Some(CanonicalAuthor { handle, name })
}

fn string_at(node: &Value, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media() -> Value {
        json!([{ "id_str": "m1", "type": "photo", "media_url_https": "https://pbs.twimg.com/media/a.jpg" }])
    }

    fn legacy_shape() -> Value {
        json!({
            "id_str": "100",
            "full_text": "hello",
            "extended_entities": { "media": media() },
            "user": { "screen_name": "alice", "name": "Alice" }
        })
    }

    fn current_shape() -> Value {
        json!({
            "tweet": {
                "rest_id": "100",
                "legacy": {
                    "id_str": "100",
                    "full_text": "hello",
                    "extended_entities": { "media": media() }
                },
                "core": { "user_results": { "result": {
                    "legacy": { "screen_name": "alice", "name": "Alice" }
                } } }
            }
        })
    }

    #[test]
    fn test_shapes_normalize_identically() {
        let legacy = normalize_post(&legacy_shape()).unwrap();
        let current = normalize_post(&current_shape()).unwrap();
        assert_eq!(legacy, current);
        assert_eq!(legacy.id, "100");
        assert_eq!(legacy.author.handle, "alice");
        assert_eq!(legacy.media.len(), 1);
    }

    #[test]
    fn test_top_level_fields_win_over_legacy() {
        let node = json!({
            "full_text": "top",
            "legacy": { "full_text": "nested", "id_str": "7" },
            "user": { "screen_name": "bob" }
        });
        let post = normalize_post(&node).unwrap();
        assert_eq!(post.text, "top");
        assert_eq!(post.id, "7");
    }

    #[test]
    fn test_note_text_preferred() {
        let mut node = legacy_shape();
        node["note_tweet"] = json!({ "note_tweet_results": { "result": { "text": "long form" } } });
        assert_eq!(normalize_post(&node).unwrap().text, "long form");
    }

    #[test]
    fn test_missing_author_is_none() {
        let node = json!({ "id_str": "1", "extended_entities": { "media": [] } });
        assert!(normalize_post(&node).is_none());

        let node = json!({ "id_str": "1", "user": { "name": "no handle" } });
        assert!(normalize_post(&node).is_none());
    }

    #[test]
    fn test_quoted_node_kept_raw() {
        let mut node = legacy_shape();
        node["quoted_status_result"] = json!({ "result": { "rest_id": "200" } });
        let post = normalize_post(&node).unwrap();
        assert_eq!(post.quoted.unwrap()["rest_id"], "200");
    }

    #[test]
    fn test_locate_post_paths() {
        let inner = json!({ "rest_id": "1" });
        let a = json!({ "data": { "tweetResult": { "result": inner.clone() } } });
        let b = json!({ "data": { "tweet_result": { "result": inner.clone() } } });
        assert_eq!(locate_post(&a), Some(&inner));
        assert_eq!(locate_post(&b), Some(&inner));
        assert!(locate_post(&json!({ "data": {} })).is_none());
        assert!(locate_post(&json!({ "errors": [] })).is_none());
    }
}
