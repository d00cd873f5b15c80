use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::provider::QueueProvider;
use crate::registry::RunningTaskRegistry;

/// Where the quit protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// No quit has been requested.
    Idle,
    /// Outstanding work found; waiting on the user's confirmation.
    ConfirmPending,
    /// Quit is going ahead; the host runs its own exit sequence.
    Proceeding,
    /// The user declined; the application keeps running.
    Cancelled,
}

/// Outcome of a quit request, consumed by the application's exit handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitDecision {
    Allowed,
    Denied,
}

/// What the confirmation dialog shows: titles of the tasks that would be
/// interrupted by quitting now.
#[derive(Debug, Clone)]
pub struct QuitWarning {
    pub blocking: Vec<String>,
}

impl QuitWarning {
    pub fn count(&self) -> usize {
        self.blocking.len()
    }
}

/// The quit-time handshake: warn if work is outstanding, and on a confirmed
/// quit drop pending work and cancel running work so exit is not held up.
pub struct ShutdownCoordinator {
    registry: Arc<RunningTaskRegistry>,
    queue: Arc<QueueProvider>,
    state: Mutex<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<RunningTaskRegistry>, queue: Arc<QueueProvider>) -> Self {
        Self {
            registry,
            queue,
            state: Mutex::new(ShutdownState::Idle),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.lock().unwrap()
    }

    /// Titles of running and queued tasks that block quitting right now.
    pub fn blocking_titles(&self) -> Vec<String> {
        self.registry
            .snapshot()
            .into_iter()
            .chain(self.queue.snapshot())
            .filter(|task| task.prevents_quit())
            .map(|task| task.title())
            .collect()
    }

    /// Run the quit protocol.
    ///
    /// With no quit-blocking work outstanding this allows the quit without
    /// involving `confirm`. Otherwise `confirm` is called with the blocking
    /// titles (the host shows its dialog here and returns the user's answer).
    /// Declining leaves every queue and task untouched. Accepting drops all
    /// not-yet-started queue entries and requests cancellation of every
    /// running task; the host then exits without waiting for their
    /// completion callbacks.
    ///
    /// The blocking set is re-evaluated when the decision comes back, not at
    /// request time: tasks finished or enqueued while the dialog was up are
    /// accounted for.
    pub fn request_quit<F>(&self, confirm: F) -> QuitDecision
    where
        F: FnOnce(&QuitWarning) -> bool,
    {
        let blocking = self.blocking_titles();
        if blocking.is_empty() {
            *self.state.lock().unwrap() = ShutdownState::Proceeding;
            return QuitDecision::Allowed;
        }

        *self.state.lock().unwrap() = ShutdownState::ConfirmPending;
        let warning = QuitWarning { blocking };
        info!(
            "⚠️ Quit requested with {} tasks still outstanding",
            warning.count()
        );

        if !confirm(&warning) {
            info!("Quit aborted by user");
            *self.state.lock().unwrap() = ShutdownState::Cancelled;
            return QuitDecision::Denied;
        }

        // Decision time: act on what is outstanding *now*, not on what was
        // outstanding when the dialog went up.
        let dropped = self.queue.clear();
        let running = self.registry.snapshot();
        warn!(
            "🛑 Quitting: dropped {} pending tasks, canceling {} running",
            dropped,
            running.len()
        );
        for task in running {
            task.cancel();
        }

        *self.state.lock().unwrap() = ShutdownState::Proceeding;
        QuitDecision::Allowed
    }
}
