//! Host capabilities consumed by the pipeline.
//!
//! This module provides abstractions for the environment the pipeline runs
//! in:
//!
//! - [`http`] - HTTP client with tracing, domain allowlist, and byte fetching
//! - [`cookies`] - Cookie access and credential resolution
//! - [`saver`] - Privileged callback-based "save URL to disk"
//! - [`sink`] - Saving already-fetched bytes

pub mod cookies;
pub mod http;
pub mod saver;
pub mod sink;

// Re-export key types
pub use cookies::{CookieJar, CookieReader, Credentials};
pub use http::{ByteFetcher, HttpClient, TransferProgress};
pub use saver::{DirectUrlSaver, SaveCallbacks, SaveOutcome, UrlSaver, save_url_with_timeout};
pub use sink::{ByteSink, DirectorySink, NullSink};
