//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::json::DownloadOutput;
    use super::super::text::TextFormatter;
    use grabline_core::{
        BulkResult, DownloadProgress, DownloadResult, ErrorKind, ExtractionResult, MediaDescriptor, MediaKind,
        PostInfo, SourceLocation,
    };
    use grabline_extract::{ExtractionAttempt, StrategyKind};
    use grabline_store::Settings;
    use std::path::Path;
    use std::time::Duration;

    fn sample_result() -> ExtractionResult {
        let items = vec![
            MediaDescriptor::new("m1", "https://pbs.twimg.com/media/m1.jpg", MediaKind::Image, 0, "100"),
            MediaDescriptor::new("v1", "https://video.twimg.com/v1.mp4", MediaKind::Video, 1, "200")
                .with_source(SourceLocation::Quoted),
        ];
        ExtractionResult::success("api", items, 1, Some(PostInfo::new("100").with_author("alice")))
    }

    #[test]
    fn test_progress_bar_empty() {
        let formatter = TextFormatter::new(false).with_bar_width(10);
        assert_eq!(formatter.progress_bar(0), "░░░░░░░░░░");
    }

    #[test]
    fn test_progress_bar_full() {
        let formatter = TextFormatter::new(false).with_bar_width(10);
        assert_eq!(formatter.progress_bar(100), "██████████");
    }

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false).with_bar_width(10);

        let test_cases = vec![
            (10, "█░░░░░░░░░"),
            (25, "███░░░░░░░"), // 2.5 rounds to 3 blocks
            (50, "█████░░░░░"),
            (74, "███████░░░"),
            (75, "████████░░"), // 7.5 rounds to 8 blocks
        ];

        for (percent, expected) in test_cases {
            assert_eq!(formatter.progress_bar(percent), expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_progress_bar_with_colors() {
        let formatter = TextFormatter::new(true);
        assert!(formatter.progress_bar(40).contains("\x1b[36m"), "Should be cyan while running");
        assert!(formatter.progress_bar(100).contains("\x1b[32m"), "Should be green when done");
    }

    #[test]
    fn test_format_extraction_marks_clicked_item() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_extraction(&sample_result());
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Post 100 by @alice"));
        assert!(lines[0].contains("(api, 2 items)"));
        assert!(lines[1].starts_with("   1. image"));
        assert!(lines[2].starts_with("▶  2. video"));
        assert!(lines[2].ends_with("[quoted]"));
    }

    #[test]
    fn test_format_extraction_failure() {
        let formatter = TextFormatter::new(false);
        let result = ExtractionResult::failure("fallback", "No media found", None);
        assert_eq!(formatter.format_extraction(&result), "✗ No media found (fallback)");
    }

    #[test]
    fn test_format_attempts() {
        let formatter = TextFormatter::new(false);
        let attempts = vec![
            ExtractionAttempt::failure("api", StrategyKind::Api, "HTTP 503", Duration::from_millis(12)),
            ExtractionAttempt::success("fallback", StrategyKind::Dom, Duration::from_millis(3)),
        ];

        let output = formatter.format_attempts(&attempts);
        assert!(output.contains("✗ api (API) 12ms: HTTP 503"));
        assert!(output.contains("✓ fallback (DOM) 3ms"));
    }

    #[test]
    fn test_format_progress() {
        let formatter = TextFormatter::new(false).with_bar_width(4);
        let progress = DownloadProgress::downloading(1, 2).unwrap();
        assert_eq!(formatter.format_progress(&progress, "items"), "██░░  50% 1/2 items");

        let unknown = DownloadProgress::complete(0);
        assert_eq!(formatter.format_progress(&unknown, "bytes"), "0 bytes");
    }

    #[test]
    fn test_format_download_mixed_results() {
        let formatter = TextFormatter::new(false);
        let bulk = BulkResult::from_results(vec![
            DownloadResult::success("100_1.jpg", "fetch"),
            DownloadResult::failure(Some("100_2.mp4".to_string()), ErrorKind::HttpStatus(404), "not found"),
            DownloadResult::not_started(),
        ]);
        let output = formatter.format_download(&DownloadOutput::new("api", Path::new("/media"), bulk));

        assert!(output.starts_with("Saved 1 of 3 to /media"));
        assert!(output.contains("✓ 100_1.jpg via fetch"));
        assert!(output.contains("✗ 100_2.mp4 HTTP 404: not found"));
        assert!(output.contains("✗ (not started) aborted: cancelled before start"));
    }

    #[test]
    fn test_format_settings() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_settings(&Settings::default());
        assert!(output.starts_with("Grabline Configuration"));
        assert!(output.contains("Strategy mode:   auto"));
        assert!(output.contains("Cookies:         none"));
    }

    #[test]
    fn test_no_ansi_without_colors() {
        let formatter = TextFormatter::new(false);
        assert!(!formatter.format_extraction(&sample_result()).contains('\x1b'));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::{DownloadOutput, ExtractionOutput, JsonFormatter};
    use grabline_core::{BulkResult, DownloadResult, ExtractionResult, MediaDescriptor, MediaKind};
    use grabline_extract::{ExtractionAttempt, ExtractionOutcome, StrategyKind};
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_format_pretty_json() {
        let formatter = JsonFormatter::new(true);

        let data = serde_json::json!({"key": "value"});
        let output = formatter.format(&data).unwrap();

        // Pretty output should have newlines
        assert!(output.contains('\n'));
        assert!(output.contains("  ")); // Indentation
    }

    #[test]
    fn test_format_compact_json() {
        let formatter = JsonFormatter::new(false);
        let output = formatter.format(&serde_json::json!({"key": "value"})).unwrap();
        assert_eq!(output, r#"{"key":"value"}"#);
    }

    #[test]
    fn test_extraction_output_flattens_result() {
        let items = vec![MediaDescriptor::new("a", "https://pbs.twimg.com/media/a.jpg", MediaKind::Image, 0, "")];
        let outcome = ExtractionOutcome {
            result: ExtractionResult::success("fallback", items, 0, None),
            attempts: vec![
                ExtractionAttempt::failure("api", StrategyKind::Api, "Missing post id", Duration::from_millis(1)),
                ExtractionAttempt::success("fallback", StrategyKind::Dom, Duration::from_millis(2)),
            ],
            duration: Duration::from_millis(3),
        };

        let output = JsonFormatter::new(false)
            .format(&ExtractionOutput::from_outcome(&outcome))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["succeeded"], true);
        assert_eq!(value["clickedIndex"], 0);
        assert_eq!(value["metadata"]["strategyName"], "fallback");
        assert_eq!(value["mediaItems"][0]["url"], "https://pbs.twimg.com/media/a.jpg");
        assert_eq!(value["attempts"][0]["kind"], "API");
        assert_eq!(value["attempts"][0]["error"], "Missing post id");
        assert!(value["attempts"][1].get("error").is_none());
        assert_eq!(value["durationMs"], 3);
    }

    #[test]
    fn test_download_output() {
        let bulk = BulkResult::from_results(vec![DownloadResult::success("a.jpg", "sink")]);
        let output = JsonFormatter::new(false)
            .format(&DownloadOutput::new("api", Path::new("/media"), bulk))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["strategy"], "api");
        assert_eq!(value["directory"], "/media");
        assert_eq!(value["succeeded"], 1);
        assert_eq!(value["failed"], 0);
        assert_eq!(value["results"][0]["filename"], "a.jpg");
    }
}
