//! Fetch error types.

use grabline_core::ErrorKind;
use thiserror::Error;

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for network, caching, and download operations.
///
/// Payloads are plain strings so the error is `Clone`; memoized prefetch
/// handles hand the same error to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// Response did not contain a usable post or author.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// No usable capability for the requested operation.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled through a token.
    #[error("Aborted: {0}")]
    Aborted(String),

    /// URL could not be built or parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Domain not allowed by the client's allowlist.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Filesystem error while saving.
    #[error("IO error: {0}")]
    Io(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Maps this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::HttpStatus(code) => ErrorKind::HttpStatus(*code),
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            Self::Timeout => ErrorKind::Timeout,
            Self::Aborted(_) => ErrorKind::Aborted,
            Self::InvalidUrl(_) | Self::DomainNotAllowed(_) | Self::Io(_) | Self::Other(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Returns true for explicit cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::Io(_) => true,
            Self::HttpStatus(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::HttpStatus(status.as_u16())
        } else if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::SchemaMismatch(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::SchemaMismatch(format!("invalid JSON: {err}"))
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(FetchError::HttpStatus(404).kind(), ErrorKind::HttpStatus(404));
        assert_eq!(FetchError::Aborted("x".into()).kind(), ErrorKind::Aborted);
        assert_eq!(FetchError::Io("disk".into()).kind(), ErrorKind::Unknown);
        assert_eq!(
            FetchError::SchemaMismatch("no author".into()).kind(),
            ErrorKind::SchemaMismatch
        );
    }

    #[test]
    fn test_transient() {
        assert!(FetchError::HttpStatus(503).is_transient());
        assert!(FetchError::HttpStatus(429).is_transient());
        assert!(!FetchError::HttpStatus(404).is_transient());
        assert!(!FetchError::Aborted("user".into()).is_transient());
    }
}
