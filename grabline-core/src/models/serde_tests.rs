//! Serde tests for core types.
//!
//! These tests pin the JSON shape that the CLI and any embedding host see.

use serde_json::json;

use crate::{
    DownloadPhase, DownloadProgress, DownloadResult, ErrorKind, ExtractionResult, MediaDescriptor,
    MediaKind, PostInfo, SourceLocation, StrategyMode,
};

// ============================================================================
// MediaDescriptor
// ============================================================================

#[test]
fn test_descriptor_uses_camel_case() {
    let d = MediaDescriptor::new("1", "https://x/a.jpg", MediaKind::Image, 0, "99")
        .with_media_key("3_1")
        .with_author("someone");
    let value = serde_json::to_value(&d).unwrap();

    assert_eq!(value["mediaKey"], "3_1");
    assert_eq!(value["postId"], "99");
    assert_eq!(value["authorHandle"], "someone");
    assert_eq!(value["sourceLocation"], "primary");
    assert_eq!(value["kind"], "image");
}

#[test]
fn test_descriptor_omits_empty_optionals() {
    let d = MediaDescriptor::new("1", "https://x/a.jpg", MediaKind::Image, 0, "99");
    let value = serde_json::to_value(&d).unwrap();

    assert!(value.get("thumbnailUrl").is_none());
    assert!(value.get("altText").is_none());
    assert!(value.get("metadata").is_none());
}

#[test]
fn test_descriptor_deserializes_without_optionals() {
    let value = json!({
        "id": "7",
        "url": "https://x/v.mp4",
        "originalUrl": "https://x/v.jpg",
        "kind": "animated_image",
        "index": 2,
        "postId": "5",
        "sourceLocation": "quoted"
    });
    let d: MediaDescriptor = serde_json::from_value(value).unwrap();

    assert_eq!(d.kind, MediaKind::AnimatedImage);
    assert_eq!(d.source_location, SourceLocation::Quoted);
    assert!(d.metadata.is_empty());
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn test_extraction_result_shape() {
    let d = MediaDescriptor::new("1", "https://x/a.jpg", MediaKind::Image, 0, "99");
    let result = ExtractionResult::success("api", vec![d], 0, Some(PostInfo::new("99")));
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["succeeded"], true);
    assert_eq!(value["clickedIndex"], 0);
    assert_eq!(value["metadata"]["strategyName"], "api");
    assert_eq!(value["postInfo"]["postId"], "99");
    assert!(value["metadata"]["extractedAtEpochMs"].as_i64().unwrap() > 0);
}

#[test]
fn test_failed_extraction_carries_error() {
    let result = ExtractionResult::failure("fallback-failed", "no media found", None);
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["succeeded"], false);
    assert_eq!(value["metadata"]["error"], "no media found");
    assert_eq!(value["mediaItems"].as_array().unwrap().len(), 0);
}

#[test]
fn test_download_result_error_kind() {
    let result = DownloadResult::failure(Some("a.jpg".into()), ErrorKind::HttpStatus(403), "forbidden");
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["error"], json!({"http_status": 403}));
}

#[test]
fn test_progress_phase() {
    let value = serde_json::to_value(DownloadProgress::complete(10)).unwrap();
    assert_eq!(value["phase"], "complete");
    let parsed: DownloadProgress = serde_json::from_value(value).unwrap();
    assert_eq!(parsed.phase, DownloadPhase::Complete);
}

#[test]
fn test_strategy_mode_parse() {
    assert_eq!("AUTO".parse::<StrategyMode>().unwrap(), StrategyMode::Auto);
    assert_eq!("fallback".parse::<StrategyMode>().unwrap(), StrategyMode::Dom);
    assert!("browser".parse::<StrategyMode>().is_err());
}
