//! Privileged "save a URL to disk" capability.
//!
//! Hosts expose this primitive through callbacks rather than futures, and
//! give no way to cancel it. [`SaveCallbacks`] is the callback side;
//! [`save_url_with_timeout`] turns a callback-based save into a future with
//! a deadline so it can sit in the same transport chain as the other
//! transports.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::cancel::{CancelToken, with_timeout};
use crate::error::FetchError;
use crate::host::http::{ByteFetcher, HttpClient};
use crate::host::sink::{ByteSink, DirectorySink};

/// Reason given to a save attempt once its caller stops waiting.
const ABANDONED_REASON: &str = "save attempt abandoned";

// ============================================================================
// Callbacks
// ============================================================================

/// How a privileged save finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The file was written.
    Loaded,
    /// The host reported an error.
    Failed(String),
    /// The host gave up on its own deadline.
    TimedOut,
}

/// Completion callbacks handed to a [`UrlSaver`].
///
/// Only the first callback to fire is recorded; later calls are ignored.
#[derive(Clone)]
pub struct SaveCallbacks {
    slot: Arc<Mutex<Option<oneshot::Sender<SaveOutcome>>>>,
    token: CancelToken,
}

impl SaveCallbacks {
    /// Creates callbacks plus the receiver that observes them.
    pub fn channel() -> (Self, oneshot::Receiver<SaveOutcome>) {
        Self::with_token(CancelToken::new())
    }

    /// Like [`SaveCallbacks::channel`], with `token` as the save's token.
    pub fn with_token(token: CancelToken) -> (Self, oneshot::Receiver<SaveOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
                token,
            },
            rx,
        )
    }

    /// Cancelled once nobody waits for this save any more.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Reports a successful save.
    pub fn on_load(&self) {
        self.fire(SaveOutcome::Loaded);
    }

    /// Reports a failed save.
    pub fn on_error(&self, message: impl Into<String>) {
        self.fire(SaveOutcome::Failed(message.into()));
    }

    /// Reports that the host timed out.
    pub fn on_timeout(&self) {
        self.fire(SaveOutcome::TimedOut);
    }

    fn fire(&self, outcome: SaveOutcome) {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The receiver may already be gone after a timeout.
            let _ = sender.send(outcome);
        }
    }
}

impl std::fmt::Debug for SaveCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveCallbacks").finish_non_exhaustive()
    }
}

// ============================================================================
// URL Saver
// ============================================================================

/// A privileged primitive that saves a URL straight to disk.
///
/// Implementations must eventually call exactly one of the callbacks, but
/// callers never rely on that: every save is wrapped in a timeout.
pub trait UrlSaver: Send + Sync {
    /// Starts saving `url` as `filename`.
    fn save_url(&self, url: &str, filename: &str, callbacks: SaveCallbacks);
}

/// Runs a callback-based save as a future with a deadline.
///
/// Each call hands the saver a fresh token derived from `token`. It is
/// cancelled when this future finishes or is dropped, so a saver that
/// honors it stops work nobody waits for.
pub async fn save_url_with_timeout(
    saver: &dyn UrlSaver,
    url: &str,
    filename: &str,
    timeout: Duration,
    token: Option<&CancelToken>,
) -> Result<(), FetchError> {
    if let Some(token) = token {
        token.check()?;
    }
    let attempt = token.map_or_else(CancelToken::new, CancelToken::child);
    let _abandon = AbandonOnDrop(attempt.clone());
    let (callbacks, outcome) = SaveCallbacks::with_token(attempt);
    saver.save_url(url, filename, callbacks);

    let wait = async {
        match outcome.await {
            Ok(SaveOutcome::Loaded) => Ok(()),
            Ok(SaveOutcome::Failed(message)) => Err(FetchError::Other(message)),
            Ok(SaveOutcome::TimedOut) => Err(FetchError::Timeout),
            Err(_) => Err(FetchError::Other(
                "saver dropped its callbacks without reporting".to_string(),
            )),
        }
    };
    with_timeout(wait, timeout, token).await
}

struct AbandonOnDrop(CancelToken);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.cancel(ABANDONED_REASON);
    }
}

// ============================================================================
// Direct URL Saver
// ============================================================================

/// Native [`UrlSaver`] that downloads in a spawned task and writes into a
/// directory.
///
/// The download stops when the callbacks' token is cancelled.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct DirectUrlSaver {
    http: HttpClient,
    sink: DirectorySink,
}

impl DirectUrlSaver {
    /// Creates a saver writing into `dir`.
    pub fn new(http: HttpClient, dir: impl Into<PathBuf>) -> Self {
        Self {
            http,
            sink: DirectorySink::new(dir),
        }
    }
}

impl UrlSaver for DirectUrlSaver {
    fn save_url(&self, url: &str, filename: &str, callbacks: SaveCallbacks) {
        let http = self.http.clone();
        let sink = self.sink.clone();
        let url = url.to_string();
        let filename = filename.to_string();

        tokio::spawn(async move {
            debug!(url = %url, filename = %filename, "Direct save started");
            let token = callbacks.token().clone();
            let result = match http.fetch_bytes(&url, None, Some(&token)).await {
                Ok(bytes) => match token.check() {
                    Ok(()) => sink.save_bytes(bytes, &filename).await,
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => callbacks.on_load(),
                Err(FetchError::Timeout) => callbacks.on_timeout(),
                Err(e) if e.is_aborted() => debug!(url = %url, "Direct save abandoned"),
                Err(e) => {
                    warn!(url = %url, error = %e, "Direct save failed");
                    callbacks.on_error(e.to_string());
                }
            }
        });
    }
}
