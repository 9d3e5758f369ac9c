//! In-flight request accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicU64,
    total: AtomicU64,
}

/// Counts requests currently served by one tenant.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    counters: Arc<Counters>,
}

/// Keeps a request counted until dropped.
#[derive(Debug)]
#[must_use = "the request is only counted while the guard is alive"]
pub struct RequestGuard {
    counters: Arc<Counters>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Whether the count reached the floor before the deadline
    pub drained: bool,
    pub remaining: u64,
    pub waited: Duration,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> RequestGuard {
        self.counters.in_flight.fetch_add(1, Ordering::AcqRel);
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        RequestGuard {
            counters: self.counters.clone(),
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    /// Requests started since the tracker was created.
    pub fn total(&self) -> u64 {
        self.counters.total.load(Ordering::Relaxed)
    }

    /// Poll until at most `floor` requests remain or `max_wait` elapses.
    pub async fn drain(&self, floor: u64, poll: Duration, max_wait: Duration) -> DrainOutcome {
        let started = Instant::now();
        let deadline = started + max_wait;
        let poll = poll.max(Duration::from_millis(1));

        loop {
            let remaining = self.in_flight();
            if remaining <= floor {
                return DrainOutcome {
                    drained: true,
                    remaining,
                    waited: started.elapsed(),
                };
            }
            let now = Instant::now();
            if now >= deadline {
                return DrainOutcome {
                    drained: false,
                    remaining,
                    waited: started.elapsed(),
                };
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }
}
