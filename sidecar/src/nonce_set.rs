//! Time-bounded nonce set
//!
//! Remembers every nonce for `time_span` seconds after first sight. Expiry is
//! passive: lookups never check age, a background sweeper removes entries
//! once they fall out of the window.

use crate::clock::{Clock, SystemClock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Interval between two eviction sweeps
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Concurrency-safe set of nonces with time-to-live
///
/// Cloning yields another handle onto the same underlying map.
#[derive(Clone)]
pub struct TtlNonceSet {
    /// Map of nonce -> insertion time (epoch seconds)
    pool: Arc<Mutex<HashMap<String, i64>>>,
    /// Retention window in seconds
    time_span: i64,
    clock: Arc<dyn Clock>,
}

impl TtlNonceSet {
    /// Create a nonce set reading time from the system clock
    pub fn new(time_span: i64) -> Self {
        Self::with_clock(time_span, Arc::new(SystemClock))
    }

    pub fn with_clock(time_span: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool: Arc::new(Mutex::new(HashMap::new())),
            time_span,
            clock,
        }
    }

    // Every critical section is a plain map operation, so a poisoned lock
    // still guards a consistent map.
    fn pool(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check whether a nonce is currently held
    ///
    /// The empty nonce always reports as present so callers reject it.
    pub fn exists(&self, nonce: &str) -> bool {
        if nonce.is_empty() {
            return true;
        }
        self.pool().contains_key(nonce)
    }

    /// Record a nonce with the current time, keeping the first insertion time
    pub fn put(&self, nonce: &str) {
        let now = self.clock.now_secs();
        self.pool().entry(nonce.to_owned()).or_insert(now);
    }

    /// Check for a nonce and record it under a single lock acquisition
    ///
    /// Returns `true` if the nonce was already present (or is empty), in which
    /// case nothing is modified. Returns `false` after inserting a fresh nonce.
    pub fn check_and_insert(&self, nonce: &str) -> bool {
        if nonce.is_empty() {
            return true;
        }

        let now = self.clock.now_secs();
        match self.pool().entry(nonce.to_owned()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(now);
                false
            }
        }
    }

    /// Remove every entry inserted before `now - time_span`
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&self) -> usize {
        let cutoff = self.clock.now_secs().saturating_sub(self.time_span);
        let mut pool = self.pool();
        let before = pool.len();
        pool.retain(|_, inserted_at| *inserted_at >= cutoff);
        before - pool.len()
    }

    /// Number of nonces currently held (for monitoring)
    pub fn len(&self) -> usize {
        self.pool().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool().is_empty()
    }

    pub fn time_span(&self) -> i64 {
        self.time_span
    }

    /// Start the background sweep on the current tokio runtime
    pub fn spawn_sweeper(&self, interval: Duration) -> Sweeper {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let set = self.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    // Fires on an explicit stop and when the Sweeper is dropped.
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let evicted = set.evict_expired();
                        if evicted > 0 {
                            debug!(evicted, remaining = set.len(), "Evicted expired nonces");
                        }
                    }
                }
            }

            debug!("Nonce sweeper stopped");
        });

        Sweeper {
            stop: stop_tx,
            handle,
        }
    }
}

/// Handle onto a running sweep task
pub struct Sweeper {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Stop the sweep and wait until the task has exited
    ///
    /// Once this returns the sweep no longer touches the nonce map.
    pub async fn shutdown(self) {
        // The task may already be gone; joining below covers both cases.
        let _ = self.stop.send(());
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Nonce sweeper terminated abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manual_set(time_span: i64) -> (TtlNonceSet, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(10_000));
        (TtlNonceSet::with_clock(time_span, clock.clone()), clock)
    }

    #[test]
    fn test_empty_nonce_always_exists() {
        let (set, _) = manual_set(60);
        assert!(set.exists(""));
        assert!(set.check_and_insert(""));
        assert!(set.is_empty());
    }

    #[test]
    fn test_put_then_exists() {
        let (set, _) = manual_set(60);
        assert!(!set.exists("n1"));

        set.put("n1");
        assert!(set.exists("n1"));
        assert!(!set.exists("n2"));
    }

    #[test]
    fn test_put_keeps_first_insertion_time() {
        let (set, clock) = manual_set(60);
        set.put("n1");

        clock.advance(50);
        set.put("n1");

        // Entry is 61s old measured from the first put and must go.
        clock.advance(11);
        assert_eq!(set.evict_expired(), 1);
        assert!(!set.exists("n1"));
    }

    #[test]
    fn test_check_and_insert_reports_replay() {
        let (set, _) = manual_set(60);
        assert!(!set.check_and_insert("n1"));
        assert!(set.check_and_insert("n1"));
        assert!(!set.check_and_insert("n2"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_evict_expired_boundary() {
        let (set, clock) = manual_set(60);
        set.put("n1");

        // Exactly time_span old is still inside the window.
        clock.advance(60);
        assert_eq!(set.evict_expired(), 0);
        assert!(set.exists("n1"));

        clock.advance(1);
        assert_eq!(set.evict_expired(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_evict_only_removes_old_entries() {
        let (set, clock) = manual_set(60);
        set.put("old");
        clock.advance(30);
        set.put("new");
        clock.advance(31);

        assert_eq!(set.evict_expired(), 1);
        assert!(!set.exists("old"));
        assert!(set.exists("new"));
    }

    #[test]
    fn test_expiry_is_passive_until_sweep() {
        let (set, clock) = manual_set(60);
        set.put("n1");
        clock.advance(3_600);

        // Nothing has swept yet.
        assert!(set.exists("n1"));
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let (set, clock) = manual_set(60);
        let sweeper = set.spawn_sweeper(Duration::from_millis(10));

        set.put("n1");
        clock.advance(61);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!set.exists("n1"));
        sweeper.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_stops_after_shutdown() {
        let (set, clock) = manual_set(60);
        let sweeper = set.spawn_sweeper(Duration::from_millis(10));
        sweeper.shutdown().await;

        set.put("n1");
        clock.advance(61);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // No sweep ran after shutdown.
        assert!(set.exists("n1"));
    }
}
