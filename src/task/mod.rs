use std::sync::Arc;

/// A unit of cancellable, asynchronous background work.
///
/// Implementations are produced by a [`TaskProvider`](crate::provider::TaskProvider)
/// and owned by the scheduler for their running lifetime. Identity is
/// reference identity: no two in-flight tasks are considered equal, even if
/// they describe the same work.
pub trait Task: Send + Sync {
    /// Display label shown in the activity list.
    fn title(&self) -> String;

    /// Whether outstanding instances should warn/block on application exit.
    fn prevents_quit(&self) -> bool {
        true
    }

    /// Begin the work. Must return promptly; the real work happens on a
    /// spawned task or thread. The [`Completion`] guard must eventually fire
    /// exactly once, on any thread, when the work finishes, fails, or is
    /// canceled. Dropping the guard fires it, so this holds even if an
    /// implementation bails out early.
    fn execute(self: Arc<Self>, completion: Completion);

    /// Best-effort request to stop. Cooperative: a task that ignores it
    /// merely delays shutdown. Completion must still eventually fire.
    fn cancel(&self) {}
}

/// Single-shot completion signal handed to [`Task::execute`].
///
/// Fires its callback exactly once: either explicitly via [`finish`], or on
/// drop. A task implementation cannot double-complete (the guard is consumed)
/// and cannot forget to complete (dropping it, including during an unwind,
/// completes it).
///
/// [`finish`]: Completion::finish
pub struct Completion {
    on_finish: Option<Box<dyn FnOnce() + Send>>,
}

impl Completion {
    pub(crate) fn new(on_finish: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_finish: Some(Box::new(on_finish)),
        }
    }

    /// Mark the work as finished, canceled, or failed.
    pub fn finish(self) {
        // Drop fires the callback.
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(on_finish) = self.on_finish.take() {
            on_finish();
        }
    }
}
