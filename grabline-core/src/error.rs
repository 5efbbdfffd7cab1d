//! Core error types for `Grabline`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Core error type for `Grabline` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid data in a descriptor or response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unknown strategy mode name.
    #[error("Unknown strategy mode: {0}")]
    UnknownStrategy(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

// ============================================================================
// Error Kind
// ============================================================================

/// Caller-facing failure categories.
///
/// Every failure that crosses the extraction or download boundary is
/// reduced to one of these kinds. Raw transport errors never reach callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection-level failure.
    NetworkFailure,
    /// Non-2xx HTTP response.
    HttpStatus(u16),
    /// Post or author could not be resolved after normalization.
    SchemaMismatch,
    /// No transport is usable in this environment.
    CapabilityUnavailable,
    /// The operation ran out of time.
    Timeout,
    /// Explicit cancellation. Never retried.
    Aborted,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Returns true for explicit cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Returns a stable short label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::HttpStatus(_) => "http_status",
            Self::SchemaMismatch => "schema_mismatch",
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkFailure => write!(f, "network failure"),
            Self::HttpStatus(code) => write!(f, "HTTP {code}"),
            Self::SchemaMismatch => write!(f, "schema mismatch"),
            Self::CapabilityUnavailable => write!(f, "no transport available"),
            Self::Timeout => write!(f, "timed out"),
            Self::Aborted => write!(f, "aborted"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}
