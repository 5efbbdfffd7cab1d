//! Download orchestration.
//!
//! - [`transport`] - The transport fallback chain and progress reporting
//! - [`orchestrator`] - Single and bulk downloads with retry and cancellation

pub mod orchestrator;
pub mod transport;

pub use orchestrator::{
    BulkOptions, DEFAULT_CONCURRENCY, DEFAULT_PRIVILEGED_TIMEOUT, DownloadConfig, DownloadOrchestrator, DownloadTask,
    SingleOptions,
};
pub use transport::{ProgressCallback, ProgressReporter, Transport, TransportKind, select_transports};
