//! Response cache with TTL support and single-flight fills.
//!
//! Entries are serialized response bodies keyed by the raw `start`/`end`
//! query strings. An entry is served until `ttl` has passed since it was
//! stored and is never invalidated otherwise.
//!
//! Concurrent misses for one key share a single fill. The fill is spawned
//! onto the runtime, so it completes and populates the cache even if every
//! request waiting on it goes away. A fill that panics is reported to its
//! waiters as [`FillAborted`] and frees the key for the next request.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

/// A fill task ended without producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache fill did not complete: {reason}")]
pub struct FillAborted {
    pub reason: String,
}

/// Source of "now" for expiry decisions.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cache key: the raw query strings, not normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub start: String,
    pub end: String,
}

impl CacheKey {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

type Fill<E> = Shared<BoxFuture<'static, Result<String, E>>>;

struct CacheState<E> {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, Fill<E>>,
}

struct Inner<E> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<E>>,
}

impl<E> Inner<E> {
    fn lock(&self) -> MutexGuard<'_, CacheState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh(&self, state: &CacheState<E>, key: &CacheKey) -> Option<String> {
        let now = self.clock.now();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.body.clone())
    }

    fn store(&self, state: &mut CacheState<E>, key: CacheKey, body: String) {
        let expires_at = self.clock.now() + self.ttl;
        debug!(key = %key, bytes = body.len(), "cached response");
        state.entries.insert(key, CacheEntry { body, expires_at });
    }
}

/// In-memory response cache.
///
/// Cloning is cheap and clones share the same entries.
pub struct ResponseCache<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for ResponseCache<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for ResponseCache<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.inner.ttl)
            .field("entries", &self.inner.lock().entries.len())
            .finish()
    }
}

impl<E> ResponseCache<E>
where
    E: From<FillAborted> + Clone + Send + Sync + 'static,
{
    /// Creates a cache on the system clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                clock,
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    in_flight: HashMap::new(),
                }),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Returns the body for `key` if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let state = self.inner.lock();
        self.inner.fresh(&state, key)
    }

    /// Stores `body` under `key`, replacing any previous entry.
    pub fn set(&self, key: CacheKey, body: impl Into<String>) {
        let mut state = self.inner.lock();
        self.inner.store(&mut state, key, body.into());
    }

    /// Returns the cached body for `key`, or runs `fill` to produce it.
    ///
    /// Callers that miss while a fill for the same key is running wait for
    /// that fill instead of starting their own. A successful result is
    /// stored; an error is handed to every waiter and nothing is stored.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn get_or_try_insert_with<F, Fut>(&self, key: CacheKey, fill: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>> + Send + 'static,
    {
        let shared = {
            let mut state = self.inner.lock();
            if let Some(body) = self.inner.fresh(&state, &key) {
                trace!(key = %key, "cache hit");
                return Ok(body);
            }
            if let Some(pending) = state.in_flight.get(&key) {
                trace!(key = %key, "joining in-flight fill");
                pending.clone()
            } else {
                debug!(key = %key, "cache miss, starting fill");
                let pending = self.start_fill(key.clone(), fill());
                state.in_flight.insert(key, pending.clone());
                pending
            }
        };
        shared.await
    }

    fn start_fill<Fut>(&self, key: CacheKey, fill: Fut) -> Fill<E>
    where
        Fut: Future<Output = Result<String, E>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        // own task, so a panic surfaces as a JoinError instead of unwinding here
        let task = tokio::spawn(fill);
        let pending = async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => {
                    error!(key = %key, error = %e, "cache fill aborted");
                    Err(E::from(FillAborted {
                        reason: e.to_string(),
                    }))
                }
            };
            let mut state = inner.lock();
            state.in_flight.remove(&key);
            match &result {
                Ok(body) => inner.store(&mut state, key, body.clone()),
                Err(_) => debug!(key = %key, "fill failed, nothing cached"),
            }
            result
        }
        .boxed()
        .shared();

        // Drive the fill to completion even if every waiter is dropped.
        tokio::spawn(pending.clone());
        pending
    }

    /// Removes all expired entries.
    pub fn evict_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            let keep = !entry.is_expired(now);
            if !keep {
                trace!(key = %key, "Evicting expired cache entry");
            }
            keep
        });
        let evicted = before - state.entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted expired cache entries");
        }
        evicted
    }

    /// Spawns a task that calls [`evict_expired`](Self::evict_expired)
    /// every `period`.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.evict_expired();
            }
        })
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
