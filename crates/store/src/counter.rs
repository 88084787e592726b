//! Keyed atomic counters with TTL expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{Result, StoreError};

/// A keyed store of integer counters with atomic increments and optional
/// time-to-live expiry.
///
/// This is the contract the inventory reservation service and the rate
/// limiter depend on. Every operation must be atomic with respect to all
/// concurrent callers on the same key: the decrement-check-undo sequence
/// used for reservations is only safe if no two callers can interleave
/// inside a single increment.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Creates or overwrites a counter with no TTL.
    async fn put(&self, key: &str, value: i64) -> Result<()>;

    /// Reads a counter. Returns `None` for missing or expired keys.
    async fn get(&self, key: &str) -> Result<Option<i64>>;

    /// Atomically adds `delta` to an existing live counter and returns the
    /// new value. Fails with [`StoreError::MissingKey`] if the key is
    /// absent or expired.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// Atomically adds `delta`, creating the counter at zero if it does not
    /// exist. When the increment creates the counter, expiry is armed at
    /// `now + ttl` in the same atomic step; the TTL of an existing counter
    /// is never refreshed.
    async fn incr_with_ttl(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64>;

    /// Time until the key expires. `None` if the key is missing, already
    /// expired, or has no TTL.
    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>>;
}

#[derive(Debug, Clone)]
struct CounterEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl CounterEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory counter store.
///
/// A single mutex over the map makes every operation linearizable, which is
/// exactly the atomicity contract the trait requires. Expired entries are
/// dropped lazily when a key is touched; there is no background sweep.
#[derive(Clone, Default)]
pub struct InMemoryCounterStore {
    entries: Arc<Mutex<HashMap<String, CounterEntry>>>,
}

impl InMemoryCounterStore {
    /// Creates a new empty counter store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live (unexpired) counters.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Returns true if there are no live counters.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn put(&self, key: &str, value: i64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CounterEntry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value)),
            None => Ok(None),
        }
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.value += delta;
                Ok(entry.value)
            }
            Some(_) => {
                entries.remove(key);
                Err(StoreError::missing(key))
            }
            None => Err(StoreError::missing(key)),
        }
    }

    async fn incr_with_ttl(&self, key: &str, delta: i64, ttl: Duration) -> Result<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired = entries.get(key).is_some_and(|e| e.is_expired(now));
        if expired {
            entries.remove(key);
        }
        let entry = entries.entry(key.to_string()).or_insert(CounterEntry {
            value: 0,
            expires_at: Some(now + ttl),
        });
        entry.value += delta;
        Ok(entry.value)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| at - now))
    }
}
