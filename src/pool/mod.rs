use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

/// Fixed-capacity concurrency budget for background work.
///
/// Each running non-exempt task holds one slot. Both methods are non-blocking
/// and safe to call from the scheduling task and from completion callbacks on
/// arbitrary threads; the counter is the only state shared across them.
pub struct WorkerPool {
    capacity: usize,
    available: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool with `capacity` worker slots. Kept small on purpose: the
    /// pool bounds how much disk/CPU/network the background work can saturate
    /// on a desktop machine.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            available: AtomicUsize::new(capacity),
        }
    }

    /// Try to reserve one slot. Returns `false` when the pool is exhausted;
    /// the caller retries on a later tick instead of waiting.
    pub fn try_acquire(&self) -> bool {
        self.available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Return a slot to the pool. Clamped at capacity: a stray double release
    /// is logged rather than allowed to inflate the budget.
    pub fn release(&self) {
        let result = self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < self.capacity {
                    Some(n + 1)
                } else {
                    None
                }
            });

        if result.is_err() {
            warn!("Worker slot released more often than acquired");
        }
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.available.load(Ordering::Acquire)
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
