//! Retry with exponential backoff and jitter.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::{CancelToken, delay};
use crate::error::FetchError;

/// Predicate deciding whether a failed attempt should be retried.
///
/// Receives the error and the 0-based index of the attempt that failed.
pub type ShouldRetry = Arc<dyn Fn(&FetchError, u32) -> bool + Send + Sync>;

/// Callback invoked before each retry with the error, the 1-based number of
/// the next attempt, and the delay about to be slept.
pub type OnRetry = Arc<dyn Fn(&FetchError, u32, Duration) + Send + Sync>;

/// Fraction of the exponential delay added as random jitter at most.
pub const JITTER_FACTOR: f64 = 0.25;

// ============================================================================
// Retry Policy
// ============================================================================

/// Policy for retrying failed operations.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, before jitter.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    should_retry: Option<ShouldRetry>,
    on_retry: Option<OnRetry>,
    token: Option<CancelToken>,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            should_retry: None,
            on_retry: None,
            token: None,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the retry predicate.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FetchError, u32) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }

    /// Sets the retry callback.
    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FetchError, u32, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Sets the cancellation token observed between attempts.
    pub fn with_token(mut self, token: Option<CancelToken>) -> Self {
        self.token = token;
        self
    }

    /// Returns the token observed between attempts.
    pub fn token(&self) -> Option<&CancelToken> {
        self.token.as_ref()
    }

    /// Calculates the delay after the given 0-based failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay, self.max_delay, rand::random::<f64>())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("should_retry", &self.should_retry.is_some())
            .field("on_retry", &self.on_retry.is_some())
            .field("token", &self.token)
            .finish()
    }
}

/// Computes `min(max, floor(base * 2^attempt * (1 + jitter * 0.25)))`.
///
/// `jitter` is expected in `[0, 1)` and is clamped into that range, so the
/// added jitter is never negative.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap
)]
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
    let exponent = attempt.min(32) as i32;
    let base_ms = base.as_millis() as f64;
    let max_ms = max.as_millis() as f64;

    let raw = base_ms * 2f64.powi(exponent) * (1.0 + jitter * JITTER_FACTOR);
    Duration::from_millis(raw.min(max_ms).floor() as u64)
}

// ============================================================================
// Retry Loop
// ============================================================================

/// Runs `operation` until it succeeds or the policy gives up.
///
/// The closure receives the 0-based attempt index. Retrying stops
/// immediately on `Aborted` errors, when the predicate declines, or when the
/// policy's token is cancelled (including during a backoff sleep).
pub async fn retry<T, F, Fut>(mut operation: F, policy: &RetryPolicy) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if let Some(token) = &policy.token {
            token.check()?;
        }

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if error.is_aborted() {
            debug!(attempt, "Attempt aborted, not retrying");
            return Err(error);
        }
        if attempt + 1 >= max_attempts {
            warn!(attempts = attempt + 1, error = %error, "Retries exhausted");
            return Err(error);
        }
        if let Some(predicate) = &policy.should_retry {
            if !predicate(&error, attempt) {
                debug!(attempt, error = %error, "Retry declined by predicate");
                return Err(error);
            }
        }

        let wait = policy.delay_for_attempt(attempt);
        debug!(attempt, delay = ?wait, error = %error, "Retrying after backoff");
        if let Some(callback) = &policy.on_retry {
            callback(&error, attempt + 1, wait);
        }
        delay(wait, policy.token.as_ref()).await?;
        attempt += 1;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_backoff_without_jitter() {
        let base = Duration::from_millis(200);
        let max = Duration::from_secs(10);
        assert_eq!(backoff_delay(0, base, max, 0.0), Duration::from_millis(200));
        assert_eq!(backoff_delay(1, base, max, 0.0), Duration::from_millis(400));
        assert_eq!(backoff_delay(2, base, max, 0.0), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_jitter_is_additive_and_floored() {
        let base = Duration::from_millis(200);
        let max = Duration::from_secs(10);
        // 200 * 1.2499 = 249.98 -> 249
        assert_eq!(backoff_delay(0, base, max, 0.9996), Duration::from_millis(249));
        // Negative jitter is clamped to zero.
        assert_eq!(backoff_delay(0, base, max, -1.0), Duration::from_millis(200));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(10).with_base_delay(Duration::from_secs(1));
        for _ in 0..20 {
            assert_eq!(policy.delay_for_attempt(8), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_delay_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..4 {
            let lower = 200u64 * 2u64.pow(attempt);
            for _ in 0..50 {
                let ms = u64::try_from(policy.delay_for_attempt(attempt).as_millis()).unwrap();
                assert!(ms >= lower && ms <= lower * 5 / 4, "attempt {attempt}: {ms}ms");
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_uses_all_attempts() {
        let policy = RetryPolicy::default();
        let stamps = Mutex::new(Vec::new());

        let result: Result<(), _> = retry(
            |_| {
                stamps.lock().unwrap().push(Instant::now());
                async { Err(FetchError::Network("refused".into())) }
            },
            &policy,
        )
        .await;

        assert_eq!(result, Err(FetchError::Network("refused".into())));
        let stamps = stamps.into_inner().unwrap();
        assert_eq!(stamps.len(), 3);

        for (i, pair) in stamps.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let lower = Duration::from_millis(200 * 2u64.pow(u32::try_from(i).unwrap()));
            assert!(gap >= lower, "gap {i} too short: {gap:?}");
            assert!(gap <= lower.mul_f64(1.25), "gap {i} too long: {gap:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(FetchError::HttpStatus(503))
                    } else {
                        Ok("done")
                    }
                }
            },
            &RetryPolicy::default(),
        )
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_is_never_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Aborted("user".into())) }
            },
            &RetryPolicy::new(5),
        )
        .await;

        assert!(matches!(result, Err(FetchError::Aborted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_predicate_declines() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5).with_should_retry(|e, _| e.is_transient());
        let result: Result<(), _> = retry(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::HttpStatus(404)) }
            },
            &policy,
        )
        .await;

        assert_eq!(result, Err(FetchError::HttpStatus(404)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_retry_called_between_attempts() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let policy = RetryPolicy::new(3).with_on_retry(move |_, next, _| sink.lock().unwrap().push(next));

        let _: Result<(), _> = retry(|_| async { Err(FetchError::Timeout) }, &policy).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let token = CancelToken::new();
        let policy = RetryPolicy::new(5)
            .with_base_delay(Duration::from_secs(5))
            .with_token(Some(token.clone()));
        let calls = AtomicU32::new(0);

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel("shutdown");
        });

        let result: Result<(), _> = retry(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FetchError::Network("down".into())) }
            },
            &policy,
        )
        .await;

        assert_eq!(result, Err(FetchError::Aborted("shutdown".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
