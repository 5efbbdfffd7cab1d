//! Download outcome and progress types.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

// ============================================================================
// Progress
// ============================================================================

/// Phase of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPhase {
    /// Bytes are still arriving.
    Downloading,
    /// The item (or batch) finished.
    Complete,
}

/// A progress event.
///
/// `percentage` is only present when `total > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Current phase.
    pub phase: DownloadPhase,
    /// Units done so far (bytes, or items for a batch).
    pub current: u64,
    /// Total units (0 when unknown).
    pub total: u64,
    /// Whole-number percentage, when `total` is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
}

impl DownloadProgress {
    /// Creates a mid-flight event. Returns `None` when `total` is 0.
    pub fn downloading(current: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        Some(Self {
            phase: DownloadPhase::Downloading,
            current,
            total,
            percentage: Some(percent(current, total)),
        })
    }

    /// Creates the final event.
    pub fn complete(total: u64) -> Self {
        Self {
            phase: DownloadPhase::Complete,
            current: total,
            total,
            percentage: if total > 0 { Some(100) } else { None },
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn percent(current: u64, total: u64) -> u8 {
    let pct = current.min(total).saturating_mul(100) / total;
    pct as u8
}

// ============================================================================
// Download Result
// ============================================================================

/// Outcome of saving one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    /// Whether the file was saved.
    pub succeeded: bool,
    /// Filename used (or that would have been used).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Failure category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Human-readable failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Transport that saved the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
}

impl DownloadResult {
    /// Creates a successful result.
    pub fn success(filename: impl Into<String>, transport: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            filename: Some(filename.into()),
            error: None,
            detail: None,
            transport: Some(transport.into()),
        }
    }

    /// Creates a failed result.
    pub fn failure(filename: Option<String>, error: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            filename,
            error: Some(error),
            detail: Some(detail.into()),
            transport: None,
        }
    }

    /// Creates the result recorded for an item that never started.
    pub fn not_started() -> Self {
        Self::failure(None, ErrorKind::Aborted, "cancelled before start")
    }

    /// Returns true if the failure was a cancellation.
    pub fn is_aborted(&self) -> bool {
        self.error.is_some_and(|e| e.is_aborted())
    }
}

// ============================================================================
// Bulk Result
// ============================================================================

/// Aggregate outcome of a batch download, one result per input in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    /// Items saved.
    pub succeeded: usize,
    /// Items not saved.
    pub failed: usize,
    /// Per-item results.
    pub results: Vec<DownloadResult>,
}

impl BulkResult {
    /// Builds the aggregate from per-item results.
    pub fn from_results(results: Vec<DownloadResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Returns true if every item was saved.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_total_suppresses_progress() {
        assert!(DownloadProgress::downloading(10, 0).is_none());
        let done = DownloadProgress::complete(0);
        assert_eq!(done.phase, DownloadPhase::Complete);
        assert_eq!(done.percentage, None);
    }

    #[test]
    fn test_percentage() {
        let p = DownloadProgress::downloading(50, 200).unwrap();
        assert_eq!(p.percentage, Some(25));
        let p = DownloadProgress::downloading(500, 200).unwrap();
        assert_eq!(p.percentage, Some(100));
    }

    #[test]
    fn test_bulk_counts() {
        let bulk = BulkResult::from_results(vec![
            DownloadResult::success("a.jpg", "fetch"),
            DownloadResult::not_started(),
            DownloadResult::failure(None, ErrorKind::HttpStatus(404), "not found"),
        ]);
        assert_eq!(bulk.succeeded, 1);
        assert_eq!(bulk.failed, 2);
        assert!(bulk.results[1].is_aborted());
        assert!(!bulk.all_succeeded());
    }
}
