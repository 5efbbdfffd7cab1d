//! Download orchestration.
//!
//! [`DownloadOrchestrator`] saves one descriptor or a batch. Each download
//! walks its transport chain; every transport is retried under the configured
//! [`RetryPolicy`] before the next one is tried. Failures never escape as
//! errors: they become unsuccessful [`DownloadResult`]s.

use bytes::Bytes;
use futures::future::join_all;
use grabline_core::{BulkResult, DownloadResult, ErrorKind, MediaDescriptor, suggested_filename};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use super::transport::{ProgressCallback, ProgressReporter, select_transports};
use crate::cancel::CancelToken;
use crate::context::HostContext;
use crate::error::FetchError;
use crate::prefetch::PrefetchCache;
use crate::retry::{RetryPolicy, retry};

/// Default timeout of one privileged save attempt.
pub const DEFAULT_PRIVILEGED_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of concurrent downloads in a batch.
pub const DEFAULT_CONCURRENCY: usize = 3;

// ============================================================================
// Configuration
// ============================================================================

/// Download settings.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Retry policy applied to every transport.
    pub retry: RetryPolicy,
    /// Per-attempt timeout of the privileged saver.
    pub privileged_timeout: Duration,
    /// Worker count for batches.
    pub concurrency: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            privileged_timeout: DEFAULT_PRIVILEGED_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl DownloadConfig {
    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the privileged save timeout.
    pub fn with_privileged_timeout(mut self, timeout: Duration) -> Self {
        self.privileged_timeout = timeout;
        self
    }

    /// Sets the batch worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

// ============================================================================
// Tasks and Options
// ============================================================================

/// One unit of download work.
#[derive(Clone)]
pub struct DownloadTask {
    /// What to download.
    pub descriptor: MediaDescriptor,
    /// Filename to save under.
    pub suggested_filename: String,
    /// Cancels the task.
    pub cancellation_token: Option<CancelToken>,
    /// Progress events.
    pub on_progress: Option<ProgressCallback>,
}

impl DownloadTask {
    /// Creates a task with the default filename for `descriptor`.
    pub fn new(descriptor: MediaDescriptor) -> Self {
        let suggested_filename = suggested_filename(&descriptor, chrono::Utc::now().timestamp_millis());
        Self {
            descriptor,
            suggested_filename,
            cancellation_token: None,
            on_progress: None,
        }
    }

    /// Overrides the filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.suggested_filename = filename.into();
        self
    }

    /// Attaches a cancellation token.
    pub fn with_token(mut self, token: Option<CancelToken>) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Attaches a progress callback.
    pub fn with_progress(mut self, on_progress: Option<ProgressCallback>) -> Self {
        self.on_progress = on_progress;
        self
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("url", &self.descriptor.url)
            .field("filename", &self.suggested_filename)
            .field("cancellable", &self.cancellation_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Options for [`DownloadOrchestrator::download_single`].
#[derive(Clone, Default)]
pub struct SingleOptions {
    /// Cancels the download.
    pub token: Option<CancelToken>,
    /// Bytes fetched ahead of time.
    pub prefetched_bytes: Option<Bytes>,
    /// Progress events.
    pub on_progress: Option<ProgressCallback>,
    /// Filename override.
    pub filename: Option<String>,
}

/// Options for [`DownloadOrchestrator::download_bulk`].
#[derive(Clone, Default)]
pub struct BulkOptions {
    /// Cancels the batch.
    pub token: Option<CancelToken>,
    /// Bytes fetched ahead of time, keyed by URL.
    pub prefetched: HashMap<String, Bytes>,
    /// Batch progress: `current` counts finished items.
    pub on_progress: Option<ProgressCallback>,
    /// Worker count override.
    pub concurrency: Option<usize>,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Saves descriptors through the host's transports.
pub struct DownloadOrchestrator {
    context: HostContext,
    config: DownloadConfig,
    prefetch: Option<Arc<PrefetchCache>>,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator with default settings.
    pub fn new(context: HostContext) -> Self {
        Self::with_config(context, DownloadConfig::default())
    }

    /// Creates an orchestrator with custom settings.
    pub fn with_config(context: HostContext, config: DownloadConfig) -> Self {
        Self {
            context,
            config,
            prefetch: None,
        }
    }

    /// Consults `cache` for bytes that are already fetched.
    pub fn with_prefetch_cache(mut self, cache: Arc<PrefetchCache>) -> Self {
        self.prefetch = Some(cache);
        self
    }

    /// Returns the attached prefetch cache.
    pub fn prefetch_cache(&self) -> Option<&Arc<PrefetchCache>> {
        self.prefetch.as_ref()
    }

    /// Returns the host context.
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// Returns the settings.
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Downloads one descriptor.
    pub async fn download_single(&self, descriptor: &MediaDescriptor, options: SingleOptions) -> DownloadResult {
        let mut task = DownloadTask::new(descriptor.clone())
            .with_token(options.token)
            .with_progress(options.on_progress);
        if let Some(filename) = options.filename {
            task = task.with_filename(filename);
        }
        self.run_task(&task, options.prefetched_bytes).await
    }

    /// Runs one task through its transport chain.
    #[instrument(skip(self, task, prefetched), fields(url = %task.descriptor.url, filename = %task.suggested_filename))]
    pub async fn run_task(&self, task: &DownloadTask, prefetched: Option<Bytes>) -> DownloadResult {
        let filename = task.suggested_filename.clone();
        let token = task.cancellation_token.as_ref();

        if let Some(err) = token.and_then(|t| t.check().err()) {
            return DownloadResult::failure(Some(filename), ErrorKind::Aborted, err.to_string());
        }

        let prefetched = prefetched.or_else(|| {
            self.prefetch
                .as_ref()
                .and_then(|cache| cache.ready_bytes(&task.descriptor.url))
        });
        let chain = select_transports(&self.context, prefetched, self.config.privileged_timeout);
        if chain.is_empty() {
            let err = FetchError::CapabilityUnavailable("no transport available".to_string());
            warn!(capabilities = ?self.context.capability_names(), "No usable transport");
            return DownloadResult::failure(Some(filename), err.kind(), err.to_string());
        }

        let policy = self.config.retry.clone().with_token(task.cancellation_token.clone());
        let reporter = ProgressReporter::new(task.on_progress.clone());
        let progress = &reporter;
        let url = task.descriptor.url.as_str();
        let name = filename.as_str();
        let mut last_error = None;

        for transport in &chain {
            let kind = transport.kind();
            debug!(transport = %kind, "Trying transport");

            let outcome = retry(move |_| transport.run(url, name, progress, token), &policy).await;
            match outcome {
                Ok(()) => {
                    info!(transport = %kind, "Download complete");
                    return DownloadResult::success(filename, kind.name());
                }
                Err(err) if err.is_aborted() => {
                    debug!(transport = %kind, "Download aborted");
                    return DownloadResult::failure(Some(filename), err.kind(), err.to_string());
                }
                Err(err) => {
                    warn!(transport = %kind, error = %err, "Transport failed");
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| FetchError::Other("transport chain exhausted".to_string()));
        DownloadResult::failure(Some(filename), err.kind(), err.to_string())
    }

    /// Downloads a batch with a bounded worker pool.
    ///
    /// Results are in input order. One item's failure never stops the batch;
    /// cancelling the token stops new items from starting, and items that
    /// never started are reported as aborted.
    #[instrument(skip(self, descriptors, options), fields(count = descriptors.len()))]
    pub async fn download_bulk(&self, descriptors: &[MediaDescriptor], options: BulkOptions) -> BulkResult {
        let total = descriptors.len();
        let workers = options
            .concurrency
            .unwrap_or(self.config.concurrency)
            .clamp(1, total.max(1));

        let next_index = AtomicUsize::new(0);
        let finished_count = AtomicUsize::new(0);
        let result_slots: Mutex<Vec<Option<DownloadResult>>> = Mutex::new(vec![None; total]);
        let reporter = ProgressReporter::new(options.on_progress.clone());

        info!(total, workers, "Bulk download started");

        let (next, finished, slots, progress) = (&next_index, &finished_count, &result_slots, &reporter);
        let options = &options;
        let token = options.token.as_ref();
        let worker = move || async move {
            loop {
                if token.is_some_and(CancelToken::is_cancelled) {
                    break;
                }
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(descriptor) = descriptors.get(index) else {
                    break;
                };

                let task = DownloadTask::new(descriptor.clone()).with_token(options.token.clone());
                let prefetched = options.prefetched.get(&descriptor.url).cloned();
                let result = self.run_task(&task, prefetched).await;

                slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(result);
                let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                progress.bytes(done as u64, total as u64);
            }
        };
        join_all((0..workers).map(|_| worker())).await;

        let results: Vec<DownloadResult> = result_slots
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .map(|slot| slot.unwrap_or_else(DownloadResult::not_started))
            .collect();
        reporter.complete(total as u64);

        let bulk = BulkResult::from_results(results);
        info!(succeeded = bulk.succeeded, failed = bulk.failed, "Bulk download finished");
        bulk
    }
}

impl std::fmt::Debug for DownloadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("context", &self.context)
            .field("config", &self.config)
            .field("prefetch", &self.prefetch.is_some())
            .finish()
    }
}
