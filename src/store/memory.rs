//! In-process window counters.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

struct Window {
    count: u64,
    started: Instant,
}

/// Per-process counter store.
///
/// Counters live in a concurrent map keyed by `(prefix, requester)`. Each
/// counter resets once its window elapses. Counts are never shared across
/// instances; use the Redis store for fleet-wide limits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    windows: Arc<DashMap<String, Window>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Increment the counter for `key`, resetting it first if the window
    /// has elapsed. Returns the post-increment count.
    pub fn incr(&self, key: &str, window: Duration) -> u64 {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: Instant::now(),
        });

        if entry.started.elapsed() >= window {
            entry.count = 0;
            entry.started = Instant::now();
        }

        entry.count += 1;
        entry.count
    }
}
