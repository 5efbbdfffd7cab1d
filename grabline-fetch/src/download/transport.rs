//! Transport fallback chain.
//!
//! A [`Transport`] is one way of getting a descriptor's bytes onto disk. The
//! chain for a download is chosen once per call from the capabilities present
//! in the [`HostContext`], in this order:
//!
//! 1. [`Transport::PrivilegedSave`] - the host saves the URL itself
//! 2. [`Transport::Prefetched`] - bytes are already in memory, hand them to the sink
//! 3. [`Transport::FetchAndSave`] - fetch the bytes, then hand them to the sink

use bytes::Bytes;
use grabline_core::DownloadProgress;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cancel::{CancelToken, until_cancelled};
use crate::context::HostContext;
use crate::error::FetchError;
use crate::host::{ByteFetcher, ByteSink, UrlSaver, save_url_with_timeout};

/// Receives progress events for one download.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

// ============================================================================
// Transport Kind
// ============================================================================

/// Tag of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Host-side "save URL to disk".
    PrivilegedSave,
    /// Save bytes that were fetched ahead of time.
    Prefetched,
    /// Fetch bytes, then save them.
    FetchAndSave,
}

impl TransportKind {
    /// Returns the name recorded in download results.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PrivilegedSave => "privileged-save",
            Self::Prefetched => "prefetched",
            Self::FetchAndSave => "fetch-and-save",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Progress Reporter
// ============================================================================

/// Forwards byte counts to an optional progress callback.
///
/// Mid-flight events are only emitted when the total is known.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    /// Creates a reporter around an optional callback.
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    /// Reports `received` of `total` bytes.
    pub fn bytes(&self, received: u64, total: u64) {
        if let (Some(callback), Some(event)) = (&self.callback, DownloadProgress::downloading(received, total)) {
            callback(event);
        }
    }

    /// Reports completion.
    pub fn complete(&self, total: u64) {
        if let Some(callback) = &self.callback {
            callback(DownloadProgress::complete(total));
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// One way of saving a descriptor.
#[derive(Clone)]
pub enum Transport {
    /// Callback-based host saver, bounded by a per-attempt timeout.
    PrivilegedSave {
        /// The saver.
        saver: Arc<dyn UrlSaver>,
        /// Deadline for one attempt.
        timeout: Duration,
    },
    /// Bytes already in memory.
    Prefetched {
        /// The bytes.
        bytes: Bytes,
        /// Where to save them.
        sink: Arc<dyn ByteSink>,
    },
    /// Network fetch followed by a save.
    FetchAndSave {
        /// Source of the bytes.
        fetcher: Arc<dyn ByteFetcher>,
        /// Where to save them.
        sink: Arc<dyn ByteSink>,
    },
}

impl Transport {
    /// Returns the tag of this transport.
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::PrivilegedSave { .. } => TransportKind::PrivilegedSave,
            Self::Prefetched { .. } => TransportKind::Prefetched,
            Self::FetchAndSave { .. } => TransportKind::FetchAndSave,
        }
    }

    /// Performs one attempt.
    pub async fn run(
        &self,
        url: &str,
        filename: &str,
        progress: &ProgressReporter,
        token: Option<&CancelToken>,
    ) -> Result<(), FetchError> {
        match self {
            Self::PrivilegedSave { saver, timeout } => {
                save_url_with_timeout(saver.as_ref(), url, filename, *timeout, token).await?;
                progress.complete(0);
            }
            Self::Prefetched { bytes, sink } => {
                let total = bytes.len() as u64;
                until_cancelled(sink.save_bytes(bytes.clone(), filename), token).await??;
                progress.complete(total);
            }
            Self::FetchAndSave { fetcher, sink } => {
                let report = |received: u64, total: u64| progress.bytes(received, total);
                let bytes = fetcher.fetch_bytes(url, Some(&report), token).await?;
                let total = bytes.len() as u64;
                until_cancelled(sink.save_bytes(bytes, filename), token).await??;
                progress.complete(total);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prefetched { bytes, .. } => f
                .debug_struct("Prefetched")
                .field("size", &bytes.len())
                .finish_non_exhaustive(),
            other => f.write_str(other.kind().name()),
        }
    }
}

/// Builds the transport chain for one download.
///
/// Prefetched bytes replace the fetch step; they never sit in front of it.
pub fn select_transports(
    context: &HostContext,
    prefetched: Option<Bytes>,
    privileged_timeout: Duration,
) -> Vec<Transport> {
    let mut chain = Vec::with_capacity(2);

    if let Some(saver) = &context.saver {
        chain.push(Transport::PrivilegedSave {
            saver: Arc::clone(saver),
            timeout: privileged_timeout,
        });
    }

    if let Some(sink) = &context.sink {
        match (prefetched, &context.fetcher) {
            (Some(bytes), _) => chain.push(Transport::Prefetched {
                bytes,
                sink: Arc::clone(sink),
            }),
            (None, Some(fetcher)) => chain.push(Transport::FetchAndSave {
                fetcher: Arc::clone(fetcher),
                sink: Arc::clone(sink),
            }),
            (None, None) => {}
        }
    }

    debug!(
        chain = ?chain.iter().map(Transport::kind).collect::<Vec<_>>(),
        "Transport chain selected"
    );
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HttpClient, NullSink, SaveCallbacks};
    use grabline_core::DownloadPhase;
    use std::sync::Mutex;

    struct OkSaver;

    impl UrlSaver for OkSaver {
        fn save_url(&self, _url: &str, _filename: &str, callbacks: SaveCallbacks) {
            callbacks.on_load();
        }
    }

    fn kinds(chain: &[Transport]) -> Vec<TransportKind> {
        chain.iter().map(Transport::kind).collect()
    }

    #[test]
    fn test_chain_order() {
        let full = HostContext::builder()
            .saver(Arc::new(OkSaver))
            .sink(Arc::new(NullSink))
            .fetcher(Arc::new(HttpClient::new()))
            .build();
        let timeout = Duration::from_secs(30);

        assert_eq!(
            kinds(&select_transports(&full, None, timeout)),
            vec![TransportKind::PrivilegedSave, TransportKind::FetchAndSave]
        );
        assert_eq!(
            kinds(&select_transports(&full, Some(Bytes::from_static(b"x")), timeout)),
            vec![TransportKind::PrivilegedSave, TransportKind::Prefetched]
        );
        assert!(select_transports(&HostContext::new(), None, timeout).is_empty());
    }

    #[test]
    fn test_fetch_requires_sink() {
        let ctx = HostContext::builder().fetcher(Arc::new(HttpClient::new())).build();
        assert!(select_transports(&ctx, None, Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_reporter_suppresses_unknown_totals() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = ProgressReporter::new(Some(Arc::new(move |p: DownloadProgress| {
            sink.lock().unwrap().push(p);
        })));

        reporter.bytes(10, 0);
        reporter.bytes(50, 100);
        reporter.complete(0);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].percentage, Some(50));
        assert_eq!(events[1].phase, DownloadPhase::Complete);
    }

    #[tokio::test]
    async fn test_prefetched_transport_completes() {
        let transport = Transport::Prefetched {
            bytes: Bytes::from_static(b"abc"),
            sink: Arc::new(NullSink),
        };
        let reporter = ProgressReporter::default();
        assert!(transport.run("https://x/a.jpg", "a.jpg", &reporter, None).await.is_ok());
    }
}
