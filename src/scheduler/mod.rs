use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::pool::WorkerPool;
use crate::provider::{Promise, TaskProvider};
use crate::registry::RunningTaskRegistry;
use crate::task::Completion;

/// Arbitrates worker slots among registered providers.
///
/// On every tick the scheduler polls each provider for a promise, serves the
/// most urgent first, and dispatches as many tasks as the pool allows. Exempt
/// promises (at or below zero) dispatch even with the pool exhausted. All
/// decisions happen on a single scheduling task; dispatched work runs on its
/// own tokio task after `execute()` returns.
///
/// Providers are registered once at startup, before the scheduler is shared
/// or its loop started.
pub struct Scheduler {
    pool: Arc<WorkerPool>,
    registry: Arc<RunningTaskRegistry>,
    providers: Vec<Arc<dyn TaskProvider>>,
}

impl Scheduler {
    pub fn new(pool: Arc<WorkerPool>, registry: Arc<RunningTaskRegistry>) -> Self {
        Self {
            pool,
            registry,
            providers: Vec::new(),
        }
    }

    /// Register a work source. Call order is irrelevant; only promise values
    /// decide who runs first.
    pub fn register_provider(&mut self, provider: Arc<dyn TaskProvider>) {
        self.providers.push(provider);
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn registry(&self) -> &Arc<RunningTaskRegistry> {
        &self.registry
    }

    /// Run one scheduling pass. Non-blocking: slot acquisition never waits,
    /// and `execute()` is required to return promptly.
    ///
    /// The pass holds at most one speculatively acquired slot at a time and
    /// only spends it on the candidate it actually dispatches. A provider
    /// that still promises after being served is re-inserted into the same
    /// pass, so a deep backlog can fill every free slot in one tick while
    /// still yielding to anything more urgent.
    pub fn tick(&self) {
        // Min-heap on (promise, provider index): most urgent first.
        let mut candidates: BinaryHeap<Reverse<(Promise, usize)>> = self
            .providers
            .iter()
            .enumerate()
            .filter_map(|(index, provider)| {
                provider.promise().map(|promise| Reverse((promise, index)))
            })
            .collect();

        let mut holding_slot = false;

        while let Some(Reverse((promise, index))) = candidates.pop() {
            if !holding_slot {
                holding_slot = self.pool.try_acquire();
            }

            if !holding_slot && !promise.is_exempt() {
                // No slot, and everything still queued is non-exempt and
                // less urgent than this candidate.
                break;
            }

            let provider = &self.providers[index];
            let task = match provider.spawn() {
                Some(task) => task,
                None => {
                    // The promise evaporated between the probe and the spawn.
                    // Keep any held slot for the next candidate.
                    debug!("Provider promised {:?} but spawned nothing", promise);
                    continue;
                }
            };

            let consumes_slot = holding_slot;
            self.registry.register(task.clone());

            let pool = self.pool.clone();
            let registry = self.registry.clone();
            let registered = task.clone();
            let completion = Completion::new(move || {
                if consumes_slot {
                    pool.release();
                }
                registry.unregister(&registered);
            });

            debug!(
                "➡️ Dispatching task: {} (promise {}, exempt: {})",
                task.title(),
                promise.value(),
                promise.is_exempt()
            );
            task.execute(completion);
            holding_slot = false;

            // The provider may have more to offer this very tick.
            if let Some(next) = provider.promise() {
                candidates.push(Reverse((next, index)));
            }
        }

        if holding_slot {
            // Speculatively acquired but never spent this pass.
            self.pool.release();
        }
    }

    /// Drive [`tick`](Scheduler::tick) on a fixed cadence until the task is
    /// aborted or the future dropped. A tick that overruns the interval
    /// causes the next one to be skipped, not queued.
    pub async fn run(self: Arc<Self>, tick_interval: Duration) {
        info!(
            "✅ Scheduler running: {} worker slots, tick every {:?}",
            self.pool.capacity(),
            tick_interval
        );

        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick();
        }
    }
}
