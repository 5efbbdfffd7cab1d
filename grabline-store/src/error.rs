//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A setting holds a value the pipeline cannot use.
    #[error("Invalid setting `{field}`: {reason}")]
    InvalidSetting {
        /// Field name as it appears in the settings file.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl StoreError {
    /// Creates an [`StoreError::InvalidSetting`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }

    /// Returns true if the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
