use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::task::Task;

/// Priority a provider offers before committing to produce work.
///
/// Ascending order means more urgent: a lower value runs first. A value at or
/// below zero is *exempt* — such work may bypass the worker pool limit
/// entirely, reserved for work whose latency the user is watching right now.
#[derive(Debug, Clone, Copy)]
pub struct Promise(f32);

impl Promise {
    /// The exemption boundary: promises at or below this run even when the
    /// pool has no free slot.
    pub const EXEMPT: Promise = Promise(0.0);

    pub fn new(value: f32) -> Self {
        debug_assert!(!value.is_nan(), "promise priority must be a real number");
        Self(value)
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Whether this work is allowed to bypass the worker pool limit.
    pub fn is_exempt(&self) -> bool {
        self.0 <= 0.0
    }
}

impl PartialEq for Promise {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Promise {}

impl PartialOrd for Promise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Promise {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A source of background work the scheduler polls every tick.
///
/// `promise` is a side-effect-free readiness probe and may be called several
/// times per tick. `spawn` is the only state-mutating operation; it may
/// return `None` even after a promise, because another actor can satisfy the
/// work in between (the scheduler tolerates this).
pub trait TaskProvider: Send + Sync {
    /// How urgently this provider has work, or `None` for "nothing this tick".
    fn promise(&self) -> Option<Promise>;

    /// Materialize one unit of work, or `None` if the promise evaporated.
    fn spawn(&self) -> Option<Arc<dyn Task>>;
}

/// Priority the queue provider promises while it has pending entries: always
/// ready, never urgent enough to preempt real work.
const QUEUE_PRIORITY: f32 = 10.0;

/// The explicit, user-visible FIFO queue of pre-built tasks.
///
/// User-initiated actions (manual imports, "analyze these tracks") enqueue
/// here; the scheduler drains it head-first whenever no more urgent provider
/// wants a slot. The pending list is inspectable by the activity UI and by
/// the shutdown coordinator.
pub struct QueueProvider {
    pending: Mutex<VecDeque<Arc<dyn Task>>>,
    priority: Promise,
}

impl QueueProvider {
    pub fn new() -> Self {
        Self::with_priority(Promise::new(QUEUE_PRIORITY))
    }

    /// Queue promising a custom (positive) priority while non-empty.
    pub fn with_priority(priority: Promise) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            priority,
        }
    }

    /// Append a task to the tail of the queue.
    pub fn enqueue(&self, task: Arc<dyn Task>) {
        debug!("➕ Queueing task: {}", task.title());
        self.pending.lock().unwrap().push_back(task);
    }

    /// Drop all not-yet-started entries, returning how many were dropped.
    /// Used when the user force-quits with work still pending.
    pub fn clear(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let dropped = pending.len();
        pending.clear();

        if dropped > 0 {
            info!("🧹 Dropped {} pending tasks from the queue", dropped);
        }
        dropped
    }

    /// Number of tasks waiting to be started.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    /// Ordered copy of the pending tasks, head first.
    pub fn snapshot(&self) -> Vec<Arc<dyn Task>> {
        self.pending.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for QueueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProvider for QueueProvider {
    fn promise(&self) -> Option<Promise> {
        if self.is_empty() {
            None
        } else {
            Some(self.priority)
        }
    }

    fn spawn(&self) -> Option<Arc<dyn Task>> {
        self.pending.lock().unwrap().pop_front()
    }
}

/// A provider with no visible queue: readiness is recomputed from live
/// application state on every poll.
///
/// Built from two closures so each work source (stale-playlist refresh,
/// current-track analysis, export regeneration) stays a plain function over
/// its own state. At most one continuous provider per scheduler should ever
/// return an exempt promise; that slot is reserved for work whose latency is
/// directly user-visible.
pub struct ContinuousProvider {
    promise_fn: Box<dyn Fn() -> Option<Promise> + Send + Sync>,
    spawn_fn: Box<dyn Fn() -> Option<Arc<dyn Task>> + Send + Sync>,
}

impl ContinuousProvider {
    pub fn new(
        promise_fn: impl Fn() -> Option<Promise> + Send + Sync + 'static,
        spawn_fn: impl Fn() -> Option<Arc<dyn Task>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            promise_fn: Box::new(promise_fn),
            spawn_fn: Box::new(spawn_fn),
        }
    }
}

impl TaskProvider for ContinuousProvider {
    fn promise(&self) -> Option<Promise> {
        (self.promise_fn)()
    }

    fn spawn(&self) -> Option<Arc<dyn Task>> {
        (self.spawn_fn)()
    }
}
