//! Domain models for Grabline.
//!
//! ## Submodules
//!
//! - [`media`] - Media descriptors (MediaDescriptor, MediaKind, SourceLocation)
//! - [`extraction`] - Extraction results (ExtractionResult, PostInfo, StrategyMode)
//! - [`download`] - Download outcomes and progress (DownloadResult, BulkResult)

mod download;
mod extraction;
mod media;

// Re-export everything at the models level
pub use download::{BulkResult, DownloadPhase, DownloadProgress, DownloadResult};
pub use extraction::{ExtractionMetadata, ExtractionResult, PostInfo, StrategyMode};
pub use media::{MediaDescriptor, MediaKind, SourceLocation};

#[cfg(test)]
mod serde_tests;
