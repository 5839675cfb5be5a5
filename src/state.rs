//! Shared per-resource transfer progress.
//!
//! Every URL being downloaded gets one [`ByteCounter`], stored in the
//! [`ProgressRegistry`] under the URL string. The registry lock only guards
//! the map itself: counters are handed out as `Arc`s and updated through
//! atomics, so a worker never holds the lock across network or disk I/O.
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// A point-in-time view of one transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferState {
    /// Size announced by the server, or `-1` when unknown.
    pub total_bytes: i64,
    /// Bytes written to disk so far. Never decreases.
    pub downloaded_bytes: i64,
    /// When the counter was first registered.
    pub start_time: Instant,
}

impl TransferState {
    /// Average throughput in bytes per second between `start_time` and `now`.
    ///
    /// Returns `0.0` when no time has elapsed rather than dividing by zero.
    pub fn rate_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start_time).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.downloaded_bytes as f64 / elapsed
    }
}

/// Thread-safe byte accumulator for a single transfer.
#[derive(Debug)]
pub struct ByteCounter {
    total_bytes: AtomicI64,
    downloaded_bytes: AtomicI64,
    start_time: Instant,
}

impl ByteCounter {
    fn new() -> Self {
        Self {
            total_bytes: AtomicI64::new(-1),
            downloaded_bytes: AtomicI64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Adds `n` freshly written bytes.
    pub fn record(&self, n: usize) {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        self.downloaded_bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Stores the expected size reported by the server (`-1` if unknown).
    pub fn set_total(&self, total: i64) {
        self.total_bytes.store(total, Ordering::Relaxed);
    }

    pub fn downloaded(&self) -> i64 {
        self.downloaded_bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> TransferState {
        TransferState {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded(),
            start_time: self.start_time,
        }
    }

    /// Current average rate in bytes per second.
    pub fn rate(&self) -> f64 {
        self.snapshot().rate_at(Instant::now())
    }
}

/// Maps a resource identifier (the source URL) to its [`ByteCounter`].
///
/// Entries are created on first use and are never removed during a run.
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    counters: Mutex<HashMap<String, Arc<ByteCounter>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<ByteCounter>>> {
        // A panic elsewhere cannot leave the map half-updated, so keep going.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the counter for `id`, creating it (and starting its clock) if unseen.
    pub fn counter(&self, id: &str) -> Arc<ByteCounter> {
        let mut counters = self.lock();
        if let Some(counter) = counters.get(id) {
            return counter.clone();
        }
        let counter = Arc::new(ByteCounter::new());
        counters.insert(id.to_string(), counter.clone());
        counter
    }

    /// Returns the counter for `id` without creating one.
    pub fn get(&self, id: &str) -> Option<Arc<ByteCounter>> {
        self.lock().get(id).cloned()
    }

    /// Adds `n` bytes to the transfer identified by `id`.
    pub fn record_bytes(&self, id: &str, n: usize) {
        self.counter(id).record(n);
    }

    /// Average rate for `id` in bytes per second; `0.0` if `id` was never seen.
    pub fn rate(&self, id: &str) -> f64 {
        self.get(id).map_or(0.0, |counter| counter.rate())
    }

    pub fn snapshot(&self, id: &str) -> Option<TransferState> {
        self.get(id).map(|counter| counter.snapshot())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
