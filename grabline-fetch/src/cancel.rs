//! Cooperative cancellation and timing primitives.
//!
//! Every networked operation in this crate accepts an optional
//! [`CancelToken`]. Tokens carry the reason for the first cancellation and
//! can be combined so that a derived token fires as soon as any input does.
//!
//! Timers created here are owned by the returned future, so they are dropped
//! on success, failure, and cancellation alike.

use std::future::Future;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;

/// Reason used when none is given.
pub const DEFAULT_CANCEL_REASON: &str = "cancelled";

// ============================================================================
// Cancel Token
// ============================================================================

struct Inner {
    token: CancellationToken,
    reason: OnceLock<String>,
    dependents: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: OnceLock::new(),
            dependents: Mutex::new(Vec::new()),
        }
    }

    fn cancel(&self, reason: &str) {
        // First reason wins; later calls are no-ops.
        if self.reason.set(reason.to_string()).is_err() {
            return;
        }
        self.token.cancel();

        let dependents = {
            let mut guard = self
                .dependents
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        for dependent in dependents.iter().filter_map(Weak::upgrade) {
            dependent.cancel(reason);
        }
    }
}

/// A clonable cooperative cancellation signal.
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new()),
        }
    }

    /// Cancels the token. Only the first reason is kept.
    pub fn cancel(&self, reason: impl AsRef<str>) {
        debug!(reason = reason.as_ref(), "Cancelling token");
        self.inner.cancel(reason.as_ref());
    }

    /// Returns true once the token is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.reason.get().is_some()
    }

    /// Returns the cancellation reason, if cancelled.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.get().cloned()
    }

    /// Completes when the token is cancelled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await;
    }

    /// Returns `Err(Aborted)` if the token is cancelled.
    pub fn check(&self) -> Result<(), FetchError> {
        match self.inner.reason.get() {
            Some(reason) => Err(FetchError::Aborted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Creates a token that is cancelled as soon as any input is.
    ///
    /// The derived token carries the reason of the first input to cancel.
    /// If an input is already cancelled the derived token starts cancelled
    /// with that input's reason (inputs are inspected in order).
    pub fn combine(tokens: &[CancelToken]) -> Self {
        let derived = Self::new();
        for token in tokens {
            // Registration happens under the parent's lock, so a concurrent
            // cancel either sees the dependent or we see the cancellation.
            let mut dependents = token
                .inner
                .dependents
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(reason) = token.inner.reason.get() {
                drop(dependents);
                derived.inner.cancel(reason);
                return derived;
            }
            dependents.retain(|w| w.strong_count() > 0);
            dependents.push(Arc::downgrade(&derived.inner));
        }
        derived
    }

    /// Creates a token cancelled with this one but cancellable on its own.
    pub fn child(&self) -> Self {
        Self::combine(std::slice::from_ref(self))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("reason", &self.inner.reason.get())
            .finish()
    }
}

fn aborted(token: &CancelToken) -> FetchError {
    FetchError::Aborted(
        token
            .reason()
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string()),
    )
}

// ============================================================================
// Timing
// ============================================================================

/// Sleeps for `duration`, failing with `Aborted` if the token fires first.
pub async fn delay(duration: Duration, token: Option<&CancelToken>) -> Result<(), FetchError> {
    let Some(token) = token else {
        tokio::time::sleep(duration).await;
        return Ok(());
    };
    token.check()?;

    tokio::select! {
        biased;
        () = token.cancelled() => Err(aborted(token)),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Races `operation` against the token.
///
/// Fails with `Aborted` as soon as the token fires; the operation future is
/// dropped at that point.
pub async fn until_cancelled<F>(operation: F, token: Option<&CancelToken>) -> Result<F::Output, FetchError>
where
    F: Future,
{
    let Some(token) = token else {
        return Ok(operation.await);
    };
    token.check()?;

    tokio::select! {
        biased;
        () = token.cancelled() => Err(aborted(token)),
        output = operation => Ok(output),
    }
}

/// Runs `operation` with a deadline.
///
/// Fails with `Timeout` if `timeout` elapses first and with `Aborted` if the
/// token fires first. Losing the race drops the operation future; work it
/// already handed to a spawned task keeps running unless that task observes
/// the same token.
pub async fn with_timeout<F, T>(
    operation: F,
    timeout: Duration,
    token: Option<&CancelToken>,
) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    let timed = async {
        match tokio::time::timeout(timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                debug!(timeout = ?timeout, "Operation timed out");
                Err(FetchError::Timeout)
            }
        }
    };
    until_cancelled(timed, token).await?
}

// ============================================================================
// Tests
// ============================================================================
