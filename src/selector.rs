//! Round-robin choice of the replica that serves the next read.

use std::sync::atomic::{AtomicU64, Ordering};

/// Index of the physical database that should serve the next read.
///
/// `n` counts every database including the primary. With no replicas the
/// primary (index 0) serves reads and the counter is left alone. Otherwise the
/// counter is bumped once and the value it held picks one of `1..n`, so index 0
/// is never returned.
pub fn secondary_index(n: usize, counter: &AtomicU64) -> usize {
    if n <= 1 {
        return 0;
    }
    let ticket = counter.fetch_add(1, Ordering::Relaxed);
    1 + (ticket % (n as u64 - 1)) as usize
}

/// Per-handle read counter shared by a [`Db`](crate::Db) and every statement
/// group prepared from it.
#[derive(Debug, Default)]
pub struct Selector {
    counter: AtomicU64,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, n: usize) -> usize {
        secondary_index(n, &self.counter)
    }

    /// Number of routing decisions made so far.
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}
