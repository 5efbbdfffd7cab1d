// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `Grabline` Core
//!
//! Core types, models, and the error taxonomy shared by every `Grabline`
//! crate.
//!
//! This crate provides the foundational values that flow through the
//! extraction and download layers:
//!
//! - Domain models (media descriptors, extraction and download results)
//! - The error taxonomy surfaced to callers
//! - Filename derivation for saved media
//!
//! ## Key Types
//!
//! ### Media
//! - [`MediaDescriptor`] - Canonical record of one discoverable media item
//! - [`MediaKind`] - Image, video, or animated image
//! - [`SourceLocation`] - Whether media came from the post or a quoted post
//!
//! ### Extraction
//! - [`ExtractionResult`] - Outcome of turning a click into descriptors
//! - [`PostInfo`] - Identity of the post owning the media
//! - [`StrategyMode`] - Which extraction path to use
//!
//! ### Download
//! - [`DownloadResult`] - Outcome of saving one descriptor
//! - [`BulkResult`] - Aggregate outcome of a batch
//! - [`DownloadProgress`] - Progress events emitted while saving
//!
//! ### Errors
//! - [`ErrorKind`] - Caller-facing failure categories
//! - [`CoreError`] - Errors raised by this crate

pub mod error;
pub mod filename;
pub mod models;

// Re-export error types
pub use error::{CoreError, ErrorKind};

// Re-export filename helpers
pub use filename::{
    DEFAULT_EXTENSION, SUPPORTED_EXTENSIONS, extension_for_url, sanitize_filename,
    suggested_filename,
};

// Re-export all model types
pub use models::{
    // Media
    MediaDescriptor,
    MediaKind,
    SourceLocation,
    // Extraction
    ExtractionMetadata,
    ExtractionResult,
    PostInfo,
    StrategyMode,
    // Download
    BulkResult,
    DownloadPhase,
    DownloadProgress,
    DownloadResult,
};
