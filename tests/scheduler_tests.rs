use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use trackwork::{
    Completion, ContinuousProvider, Promise, QueueProvider, QuitDecision, RunningTaskRegistry,
    Scheduler, ShutdownCoordinator, ShutdownState, Task, TaskProvider, WorkerPool,
};

/// Task that parks its completion guard so a test can decide when it ends.
struct ManualTask {
    label: String,
    prevents_quit: bool,
    cancelled: AtomicBool,
    completion: Mutex<Option<Completion>>,
}

impl ManualTask {
    fn new(label: &str) -> Arc<Self> {
        Self::with_quit_blocking(label, true)
    }

    fn with_quit_blocking(label: &str, prevents_quit: bool) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            prevents_quit,
            cancelled: AtomicBool::new(false),
            completion: Mutex::new(None),
        })
    }

    fn is_running(&self) -> bool {
        self.completion.lock().unwrap().is_some()
    }

    fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Complete the work by dropping the parked guard.
    fn finish(&self) {
        self.completion.lock().unwrap().take();
    }
}

impl Task for ManualTask {
    fn title(&self) -> String {
        self.label.clone()
    }

    fn prevents_quit(&self) -> bool {
        self.prevents_quit
    }

    fn execute(self: Arc<Self>, completion: Completion) {
        *self.completion.lock().unwrap() = Some(completion);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Continuous-style provider the test arms with one task at a time.
struct ArmedProvider {
    promise: Promise,
    slot: Mutex<Option<Arc<dyn Task>>>,
}

impl ArmedProvider {
    fn new(promise: Promise) -> Arc<Self> {
        Arc::new(Self {
            promise,
            slot: Mutex::new(None),
        })
    }

    fn arm(&self, task: Arc<ManualTask>) {
        *self.slot.lock().unwrap() = Some(task);
    }
}

impl TaskProvider for ArmedProvider {
    fn promise(&self) -> Option<Promise> {
        if self.slot.lock().unwrap().is_some() {
            Some(self.promise)
        } else {
            None
        }
    }

    fn spawn(&self) -> Option<Arc<dyn Task>> {
        self.slot.lock().unwrap().take()
    }
}

struct Fixture {
    pool: Arc<WorkerPool>,
    registry: Arc<RunningTaskRegistry>,
    queue: Arc<QueueProvider>,
}

impl Fixture {
    fn new(capacity: usize) -> Self {
        Self {
            pool: Arc::new(WorkerPool::new(capacity)),
            registry: Arc::new(RunningTaskRegistry::new()),
            queue: Arc::new(QueueProvider::with_priority(Promise::new(5.0))),
        }
    }

    fn scheduler(&self, extra: Vec<Arc<dyn TaskProvider>>) -> Scheduler {
        let mut scheduler = Scheduler::new(self.pool.clone(), self.registry.clone());
        scheduler.register_provider(self.queue.clone());
        for provider in extra {
            scheduler.register_provider(provider);
        }
        scheduler
    }
}

// Scenario 1: capacity 2, three queued tasks. The first tick fills both
// slots; the third task waits until a slot frees.
#[test]
fn first_tick_dispatches_up_to_capacity() {
    let fx = Fixture::new(2);
    let a = ManualTask::new("a");
    let b = ManualTask::new("b");
    let c = ManualTask::new("c");
    fx.queue.enqueue(a.clone());
    fx.queue.enqueue(b.clone());
    fx.queue.enqueue(c.clone());

    let scheduler = fx.scheduler(vec![]);
    scheduler.tick();

    assert!(a.is_running());
    assert!(b.is_running());
    assert!(!c.is_running());
    assert_eq!(fx.registry.running_count(), 2);
    assert_eq!(fx.queue.pending_count(), 1);
    assert_eq!(fx.pool.available(), 0);

    // Nothing changes while the pool stays full.
    scheduler.tick();
    assert!(!c.is_running());

    a.finish();
    scheduler.tick();
    assert!(c.is_running());
    assert_eq!(fx.queue.pending_count(), 0);
}

// Scenario 2: capacity 1, fully occupied; an exempt promise appearing later
// dispatches in the same tick anyway, running-task count temporarily 2.
#[test]
fn exempt_work_bypasses_exhausted_pool() {
    let fx = Fixture::new(1);
    let long_running = ManualTask::new("long");
    fx.queue.enqueue(long_running.clone());

    let current_track = ArmedProvider::new(Promise::EXEMPT);
    let scheduler = fx.scheduler(vec![current_track.clone() as Arc<dyn TaskProvider>]);

    scheduler.tick();
    assert!(long_running.is_running());
    assert_eq!(fx.pool.available(), 0);

    // The pool is exhausted when the exempt work turns up.
    let exempt = ManualTask::new("exempt");
    current_track.arm(exempt.clone());
    scheduler.tick();

    assert!(exempt.is_running());
    assert_eq!(fx.registry.running_count(), 2);
    assert_eq!(fx.pool.available(), 0);

    // The exempt task never held a slot, so finishing it frees nothing.
    exempt.finish();
    assert_eq!(fx.pool.available(), 0);
    assert_eq!(fx.registry.running_count(), 1);

    long_running.finish();
    assert_eq!(fx.pool.available(), 1);
    assert_eq!(fx.registry.running_count(), 0);
}

// Exemption property: an exempt promise is spawned in the very tick it is
// made, regardless of saturation.
#[test]
fn exempt_promise_spawns_same_tick() {
    let fx = Fixture::new(0);
    let provider = ArmedProvider::new(Promise::new(-1.0));
    let exempt = ManualTask::new("exempt");
    provider.arm(exempt.clone());

    let scheduler = fx.scheduler(vec![provider as Arc<dyn TaskProvider>]);
    scheduler.tick();

    assert!(exempt.is_running());
}

// Scenario 3: a more urgent (but non-exempt) continuous promise beats the
// queue for the single free slot.
#[test]
fn urgent_continuous_work_preempts_queue() {
    let fx = Fixture::new(1);
    let queued = ManualTask::new("queued");
    fx.queue.enqueue(queued.clone());

    let provider = ArmedProvider::new(Promise::new(1.0));
    let urgent = ManualTask::new("urgent");
    provider.arm(urgent.clone());

    let scheduler = fx.scheduler(vec![provider as Arc<dyn TaskProvider>]);
    scheduler.tick();

    assert!(urgent.is_running());
    assert!(!queued.is_running());
    assert_eq!(fx.queue.pending_count(), 1);

    urgent.finish();
    scheduler.tick();
    assert!(queued.is_running());
}

// Scenario 4: quit with two queued non-blocking tasks and one running
// quit-blocking task.
#[test]
fn quit_clears_queue_and_cancels_running() {
    let fx = Fixture::new(1);
    let running = ManualTask::new("Analyze Track");
    fx.queue.enqueue(running.clone());

    let scheduler = fx.scheduler(vec![]);
    scheduler.tick();
    assert!(running.is_running());

    fx.queue
        .enqueue(ManualTask::with_quit_blocking("queued a", false));
    fx.queue
        .enqueue(ManualTask::with_quit_blocking("queued b", false));

    let coordinator = ShutdownCoordinator::new(fx.registry.clone(), fx.queue.clone());
    let confirmed = Arc::new(AtomicBool::new(false));
    let confirmed_flag = confirmed.clone();

    let decision = coordinator.request_quit(move |warning| {
        confirmed_flag.store(true, Ordering::SeqCst);
        assert_eq!(warning.blocking, vec!["Analyze Track"]);
        true
    });

    assert!(confirmed.load(Ordering::SeqCst), "confirmation was shown");
    assert_eq!(decision, QuitDecision::Allowed);
    assert_eq!(coordinator.state(), ShutdownState::Proceeding);
    // The two queued tasks were dropped, never spawned.
    assert_eq!(fx.queue.pending_count(), 0);
    // The running task got a cancel request but quit did not wait for it.
    assert!(running.was_cancelled());
    assert!(running.is_running());
}

#[test]
fn queue_serves_tasks_fifo_across_ticks() {
    let fx = Fixture::new(1);
    let tasks: Vec<_> = ["a", "b", "c"].iter().map(|l| ManualTask::new(l)).collect();
    for task in &tasks {
        fx.queue.enqueue(task.clone());
    }

    let scheduler = fx.scheduler(vec![]);
    let mut order = Vec::new();
    for _ in 0..3 {
        scheduler.tick();
        order.push(fx.registry.snapshot()[0].title());
        for task in &tasks {
            task.finish();
        }
    }

    assert_eq!(order, vec!["a", "b", "c"]);
}

// A backlogged provider may fill every free slot within a single tick.
#[test]
fn backlogged_queue_consumes_all_slots_in_one_tick() {
    let fx = Fixture::new(3);
    for label in ["a", "b", "c", "d"] {
        fx.queue.enqueue(ManualTask::new(label));
    }

    let scheduler = fx.scheduler(vec![]);
    scheduler.tick();

    assert_eq!(fx.registry.running_count(), 3);
    assert_eq!(fx.queue.pending_count(), 1);
    assert_eq!(fx.pool.available(), 0);
}

// Starvation freedom: urgent work appearing over a perpetual low-priority
// backlog is served within one tick of promising.
#[test]
fn urgent_provider_not_starved_by_backlog() {
    let fx = Fixture::new(1);
    let backlog: Vec<_> = ["bg1", "bg2", "bg3", "bg4"]
        .iter()
        .map(|l| ManualTask::new(l))
        .collect();
    for task in &backlog {
        fx.queue.enqueue(task.clone());
    }

    let provider = ArmedProvider::new(Promise::new(1.0));
    let scheduler = fx.scheduler(vec![provider.clone() as Arc<dyn TaskProvider>]);

    scheduler.tick();
    assert!(backlog[0].is_running());

    // Urgent work appears; the running background task finishes.
    let urgent = ManualTask::new("urgent");
    provider.arm(urgent.clone());
    backlog[0].finish();

    scheduler.tick();
    assert!(urgent.is_running());
    assert!(
        !backlog[1].is_running(),
        "the backlog must yield the freed slot to the urgent provider"
    );
}

// Slot conservation: after all dispatched work completes, every acquired
// slot has been released exactly once.
#[test]
fn slots_conserved_across_dispatch_and_completion() {
    let fx = Fixture::new(2);
    let tasks: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|l| ManualTask::new(l))
        .collect();
    for task in &tasks {
        fx.queue.enqueue(task.clone());
    }

    let scheduler = fx.scheduler(vec![]);
    for _ in 0..8 {
        scheduler.tick();
        for task in &tasks {
            task.finish();
        }
    }

    assert_eq!(fx.queue.pending_count(), 0);
    assert_eq!(fx.registry.running_count(), 0);
    assert_eq!(fx.pool.available(), 2);
}

// Capacity invariant: non-exempt running tasks never exceed the pool size,
// even with an exempt provider over-subscribing on the side.
#[test]
fn non_exempt_running_tasks_never_exceed_capacity() {
    let fx = Fixture::new(2);
    for label in ["a", "b", "c", "d", "e", "f"] {
        fx.queue.enqueue(ManualTask::new(label));
    }

    let current_track = ArmedProvider::new(Promise::EXEMPT);
    let scheduler = fx.scheduler(vec![current_track.clone() as Arc<dyn TaskProvider>]);

    let mut exempt_tasks = Vec::new();
    for round in 0..4 {
        let exempt = ManualTask::new(&format!("exempt {round}"));
        current_track.arm(exempt.clone());
        exempt_tasks.push(exempt);

        scheduler.tick();

        let running = fx.registry.running_count();
        let exempt_running = exempt_tasks.iter().filter(|t| t.is_running()).count();
        assert!(
            running - exempt_running <= 2,
            "round {round}: {running} running, {exempt_running} exempt"
        );
    }
}

// A provider that promises but spawns nothing must not stall the rest of
// the tick or leak its reserved slot.
#[test]
fn evaporated_promise_does_not_block_others() {
    let fx = Fixture::new(1);
    let queued = ManualTask::new("queued");
    fx.queue.enqueue(queued.clone());

    let liar: Arc<dyn TaskProvider> = Arc::new(ContinuousProvider::new(
        || Some(Promise::new(1.0)),
        || None,
    ));

    let scheduler = fx.scheduler(vec![liar]);
    scheduler.tick();

    assert!(queued.is_running());
    assert_eq!(fx.pool.available(), 0);

    queued.finish();
    assert_eq!(fx.pool.available(), 1);
}
