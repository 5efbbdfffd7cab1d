// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Grabline Fetch
//!
//! Networking, caching, and download infrastructure for Grabline.
//!
//! ## Host Capabilities
//!
//! The [`host`] module abstracts what the environment provides:
//!
//! - [`host::http`] - HTTP client with tracing, domain allowlist, and byte fetching
//! - [`host::cookies`] - Cookie parsing and credential resolution
//! - [`host::saver`] - Callback-based privileged "save URL to disk"
//! - [`host::sink`] - Saving already-fetched bytes
//!
//! [`context::HostContext`] bundles whichever of these are present.
//!
//! ## Timing
//!
//! - [`cancel`] - Cancellation tokens, `delay`, and `with_timeout`
//! - [`retry`] - Retry with exponential backoff and jitter
//!
//! ## Pipeline Pieces
//!
//! - [`api`] - Host API client with a bounded request cache
//! - [`prefetch`] - Coalescing byte prefetch cache
//! - [`download`] - Transport fallback chain and download orchestration
//!
//! ## Example
//!
//! ```ignore
//! use grabline_fetch::{DownloadOrchestrator, HostContext, HttpClient, DirectorySink, SingleOptions};
//! use std::sync::Arc;
//!
//! let context = HostContext::builder()
//!     .fetcher(Arc::new(HttpClient::new()))
//!     .sink(Arc::new(DirectorySink::new("downloads")))
//!     .build();
//!
//! let orchestrator = DownloadOrchestrator::new(context);
//! let result = orchestrator.download_single(&descriptor, SingleOptions::default()).await;
//! ```

pub mod api;
pub mod cancel;
pub mod context;
pub mod download;
pub mod error;
pub mod host;
pub mod prefetch;
pub mod retry;

// Re-export key types at crate root

// Errors
pub use error::FetchError;

// Timing
pub use cancel::{CancelToken, delay, until_cancelled, with_timeout};
pub use retry::{RetryPolicy, backoff_delay, retry};

// Host capabilities
pub use context::{HostContext, HostContextBuilder};
pub use host::{
    ByteFetcher, ByteSink, CookieJar, CookieReader, Credentials, DirectUrlSaver, DirectorySink, HttpClient, NullSink,
    SaveCallbacks, SaveOutcome, UrlSaver,
};

// API
pub use api::{ApiClientConfig, ApiTransport, HostApiClient, RequestCache};

// Prefetch
pub use prefetch::{CacheState, PrefetchCache, PrefetchHandle, PrefetchPriority};

// Downloads
pub use download::{
    BulkOptions, DownloadConfig, DownloadOrchestrator, DownloadTask, ProgressCallback, SingleOptions, Transport,
    TransportKind,
};
