//! JSON output formatting.

use anyhow::Result;
use grabline_core::{BulkResult, ExtractionResult};
use grabline_extract::{ExtractionAttempt, ExtractionOutcome};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for the extract command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput<'a> {
    #[serde(flatten)]
    pub result: &'a ExtractionResult,
    pub attempts: Vec<AttemptOutput>,
    pub duration_ms: u64,
}

impl<'a> ExtractionOutput<'a> {
    /// Builds the output from a pipeline outcome.
    pub fn from_outcome(outcome: &'a ExtractionOutcome) -> Self {
        Self {
            result: &outcome.result,
            attempts: outcome.attempts.iter().map(AttemptOutput::from).collect(),
            duration_ms: millis(outcome.duration),
        }
    }
}

/// One strategy run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutput {
    pub strategy: String,
    pub kind: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl From<&ExtractionAttempt> for AttemptOutput {
    fn from(attempt: &ExtractionAttempt) -> Self {
        Self {
            strategy: attempt.strategy.clone(),
            kind: attempt.kind.display_name(),
            success: attempt.success,
            error: attempt.error.clone(),
            duration_ms: millis(attempt.duration),
        }
    }
}

/// JSON output for the download command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutput {
    pub strategy: String,
    pub directory: String,
    #[serde(flatten)]
    pub results: BulkResult,
}

impl DownloadOutput {
    /// Creates the output for a finished download.
    pub fn new(strategy: &str, directory: &Path, results: BulkResult) -> Self {
        Self {
            strategy: strategy.to_string(),
            directory: directory.display().to_string(),
            results,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}
