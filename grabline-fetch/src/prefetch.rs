//! Prefetch cache for media bytes.
//!
//! Fetches are keyed by descriptor URL and started on the tokio runtime.
//! Callers get a [`PrefetchHandle`], a shared future that resolves to the
//! same value for every clone, so asking twice never fetches twice. Failed
//! fetches stay cached as [`CacheState::Failed`] until [`PrefetchCache::clear`].
//!
//! The cache holds at most `capacity` entries and evicts the least recently
//! used one when full.

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use grabline_core::MediaDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, trace, warn};

use crate::cancel::{CancelToken, delay, until_cancelled};
use crate::error::FetchError;
use crate::host::ByteFetcher;

/// Default number of cached fetches.
pub const DEFAULT_PREFETCH_CAPACITY: usize = 32;

/// How long an idle-priority fetch waits before starting.
pub const IDLE_DELAY: Duration = Duration::from_millis(100);

/// Largest neighbor range accepted by [`neighbor_order`].
pub const MAX_NEIGHBOR_RANGE: usize = 20;

/// Reason recorded when outstanding prefetches are cancelled.
const CANCEL_REASON: &str = "prefetch cancelled";

/// Shared handle to the eventual bytes of a prefetch.
pub type PrefetchHandle = Shared<BoxFuture<'static, Result<Bytes, FetchError>>>;

// ============================================================================
// Types
// ============================================================================

/// When a prefetch should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchPriority {
    /// Start right away.
    Immediate,
    /// Start after a short idle delay.
    Idle,
}

/// State of a cached fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Fetch in flight.
    Pending,
    /// Bytes available.
    Ready,
    /// Fetch failed; not retried automatically.
    Failed,
}

/// One cached fetch. Owned by the cache; callers only see handles.
struct CachedFetch {
    state: CacheState,
    payload: Option<Bytes>,
    created_at_epoch_ms: i64,
    last_access: u64,
    generation: u64,
    handle: PrefetchHandle,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, CachedFetch>,
    tick: u64,
    next_generation: u64,
}

impl Inner {
    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(url, _)| url.clone());
        if let Some(url) = oldest {
            trace!(url = %url, "Evicting prefetch entry");
            self.entries.remove(&url);
        }
    }
}

// ============================================================================
// Prefetch Cache
// ============================================================================

/// Keyed, capacity-bounded cache of byte fetches.
///
/// Must be used from within a tokio runtime.
pub struct PrefetchCache {
    fetcher: Arc<dyn ByteFetcher>,
    capacity: usize,
    inner: Arc<Mutex<Inner>>,
    token: Mutex<CancelToken>,
}

impl PrefetchCache {
    /// Creates a cache with the default capacity.
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self::with_capacity(fetcher, DEFAULT_PREFETCH_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` fetches (minimum 1).
    pub fn with_capacity(fetcher: Arc<dyn ByteFetcher>, capacity: usize) -> Self {
        Self {
            fetcher,
            capacity: capacity.max(1),
            inner: Arc::new(Mutex::new(Inner::default())),
            token: Mutex::new(CancelToken::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    fn current_token(&self) -> CancelToken {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Starts fetching the descriptor's bytes unless a fetch for its URL is
    /// already cached.
    pub fn prefetch(&self, descriptor: &MediaDescriptor, priority: PrefetchPriority) {
        self.prefetch_url(&descriptor.url, priority);
    }

    /// Starts fetching `url` unless it is already cached.
    pub fn prefetch_url(&self, url: &str, priority: PrefetchPriority) {
        let mut inner = self.lock();
        let tick = inner.touch();
        if let Some(entry) = inner.entries.get_mut(url) {
            entry.last_access = tick;
            trace!(url, "Prefetch already cached");
            return;
        }

        if inner.entries.len() >= self.capacity {
            inner.evict_lru();
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let handle = self.spawn_fetch(url.to_string(), priority, generation);
        inner.entries.insert(
            url.to_string(),
            CachedFetch {
                state: CacheState::Pending,
                payload: None,
                created_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
                last_access: tick,
                generation,
                handle,
            },
        );
        debug!(url, ?priority, "Prefetch started");
    }

    /// Prefetches the neighbors of `current` within `range`, nearest first.
    pub fn prefetch_around(
        &self,
        items: &[MediaDescriptor],
        current: usize,
        range: usize,
        priority: PrefetchPriority,
    ) {
        for index in neighbor_order(items.len(), current, range) {
            self.prefetch(&items[index], priority);
        }
    }

    /// Fetches `current` and its neighbors right away and waits until every
    /// one of them has settled.
    ///
    /// Returns how many of them are [`CacheState::Ready`]. Cancelling `token`
    /// stops the wait, not the fetches.
    #[instrument(skip(self, items, token), fields(total = items.len()))]
    pub async fn warm_around(
        &self,
        items: &[MediaDescriptor],
        current: usize,
        range: usize,
        token: Option<&CancelToken>,
    ) -> usize {
        let Some(clicked) = items.get(current) else {
            return 0;
        };
        // Neighbors on both sides plus the current item must fit.
        let range = range.min((self.capacity - 1) / 2);
        self.prefetch(clicked, PrefetchPriority::Immediate);
        self.prefetch_around(items, current, range, PrefetchPriority::Immediate);

        let mut urls = vec![clicked.url.as_str()];
        urls.extend(neighbor_order(items.len(), current, range).into_iter().map(|i| items[i].url.as_str()));

        let mut ready = 0;
        for url in urls {
            let Some(handle) = self.get(url) else {
                continue;
            };
            match until_cancelled(handle, token).await {
                Ok(Ok(_)) => ready += 1,
                Ok(Err(_)) => {}
                Err(_) => break,
            }
        }
        debug!(ready, "Prefetch warm-up settled");
        ready
    }

    fn spawn_fetch(&self, url: String, priority: PrefetchPriority, generation: u64) -> PrefetchHandle {
        let fetcher = Arc::clone(&self.fetcher);
        let inner = Arc::clone(&self.inner);
        let token = self.current_token();

        let task = tokio::spawn(async move {
            let result = async {
                if priority == PrefetchPriority::Idle {
                    delay(IDLE_DELAY, Some(&token)).await?;
                }
                fetcher.fetch_bytes(&url, None, Some(&token)).await
            }
            .await;

            let mut guard = lock_inner(&inner);
            if let Some(entry) = guard.entries.get_mut(&url).filter(|e| e.generation == generation) {
                match &result {
                    Ok(bytes) => {
                        entry.state = CacheState::Ready;
                        entry.payload = Some(bytes.clone());
                        debug!(url = %url, size = bytes.len(), "Prefetch ready");
                    }
                    Err(e) => {
                        entry.state = CacheState::Failed;
                        if !e.is_aborted() {
                            warn!(url = %url, error = %e, "Prefetch failed");
                        }
                    }
                }
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(FetchError::Other(format!("prefetch task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    /// Returns a handle to the bytes of `url`, or `None` if never requested.
    pub fn get(&self, url: &str) -> Option<PrefetchHandle> {
        let mut inner = self.lock();
        let tick = inner.touch();
        inner.entries.get_mut(url).map(|entry| {
            entry.last_access = tick;
            entry.handle.clone()
        })
    }

    /// Returns the state of `url`, if cached.
    pub fn state(&self, url: &str) -> Option<CacheState> {
        self.lock().entries.get(url).map(|entry| entry.state)
    }

    /// Returns the bytes of `url` if its fetch already completed.
    pub fn ready_bytes(&self, url: &str) -> Option<Bytes> {
        self.lock().entries.get(url).and_then(|entry| entry.payload.clone())
    }

    /// Returns when `url` was first requested.
    pub fn created_at(&self, url: &str) -> Option<i64> {
        self.lock().entries.get(url).map(|entry| entry.created_at_epoch_ms)
    }

    /// Number of cached fetches.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached fetches.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cancels every in-flight fetch and forgets it.
    ///
    /// Completed and failed entries are kept. Handles obtained earlier for
    /// cancelled fetches resolve to `Aborted`.
    pub fn cancel_all(&self) {
        let previous = {
            let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *token)
        };
        previous.cancel(CANCEL_REASON);

        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.state != CacheState::Pending);
        debug!(cancelled = before - inner.entries.len(), "Prefetches cancelled");
    }

    /// Cancels in-flight fetches and drops every entry.
    pub fn clear(&self) {
        self.cancel_all();
        self.lock().entries.clear();
    }
}

impl std::fmt::Debug for PrefetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefetchCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Orders the neighbors of `current` by distance, the next item before the
/// previous one at equal distance.
///
/// `range` is clamped to [`MAX_NEIGHBOR_RANGE`]; `current` is clamped into
/// the list.
pub fn neighbor_order(total: usize, current: usize, range: usize) -> Vec<usize> {
    if total == 0 {
        return Vec::new();
    }
    let current = current.min(total - 1);
    let range = range.min(MAX_NEIGHBOR_RANGE);

    let mut order = Vec::with_capacity(range * 2);
    for distance in 1..=range {
        if let Some(next) = current.checked_add(distance).filter(|n| *n < total) {
            order.push(next);
        }
        if let Some(prev) = current.checked_sub(distance) {
            order.push(prev);
        }
    }
    order
}
