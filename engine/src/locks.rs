//! Keyed critical sections with bounded waits.
//!
//! One async mutex per key, created on demand and dropped when the last holder
//! or waiter goes away. Work on different keys never contends; work on the same
//! key is serialized. Acquisition gives up after the configured wait so a hot
//! key surfaces as a retryable error instead of a hung request.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Returned when a key could not be locked within the wait bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockTimeout {
    /// Rendered key that timed out
    pub key: String,
    /// How long we waited
    pub waited: Duration,
}

impl fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timed out after {:?} waiting for {}", self.waited, self.key)
    }
}

impl std::error::Error for LockTimeout {}

type Slots<K> = Mutex<HashMap<K, Arc<AsyncMutex<()>>>>;

/// A registry of per-key async mutexes.
pub struct KeyedLocks<K> {
    slots: Arc<Slots<K>>,
    wait: Duration,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + fmt::Display + Send + 'static,
{
    /// Creates a registry whose acquisitions wait at most `wait`.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            wait,
        }
    }

    /// Lock `key`, waiting at most the configured bound.
    ///
    /// # Errors
    ///
    /// Returns [`LockTimeout`] if the key stays held past the bound.
    pub async fn acquire(&self, key: K) -> Result<KeyedGuard<K>, LockTimeout> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.wait, Arc::clone(&slot).lock_owned()).await;
        metrics::histogram!("showtime_lock_wait_seconds").record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(guard) => Ok(KeyedGuard {
                guard: Some(guard),
                slot: Some(slot),
                key,
                slots: Arc::clone(&self.slots),
            }),
            Err(_) => {
                let rendered = key.to_string();
                release_slot(&self.slots, &key, slot);
                tracing::warn!(key = %rendered, wait = ?self.wait, "Critical section wait timed out");
                Err(LockTimeout {
                    key: rendered,
                    waited: self.wait,
                })
            }
        }
    }

    /// Number of keys currently tracked (held or awaited).
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<K> fmt::Debug for KeyedLocks<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLocks").field("wait", &self.wait).finish_non_exhaustive()
    }
}

/// Drops our handle on `slot` and forgets the key if nobody else holds one.
fn release_slot<K: Eq + Hash>(slots: &Slots<K>, key: &K, slot: Arc<AsyncMutex<()>>) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    drop(slot);
    if slots
        .get(key)
        .is_some_and(|current| Arc::strong_count(current) == 1)
    {
        slots.remove(key);
    }
}

/// Holds a key's critical section until dropped.
pub struct KeyedGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    slot: Option<Arc<AsyncMutex<()>>>,
    key: K,
    slots: Arc<Slots<K>>,
}

impl<K: Eq + Hash> KeyedGuard<K> {
    /// The locked key
    pub const fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash + fmt::Debug> fmt::Debug for KeyedGuard<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish_non_exhaustive()
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        // The owned guard keeps its own Arc; release it before counting holders.
        drop(self.guard.take());
        if let Some(slot) = self.slot.take() {
            release_slot(&self.slots, &self.key, slot);
        }
    }
}
