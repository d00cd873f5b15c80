use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::provider::QueueProvider;
use crate::task::Task;

/// Bookkeeping of tasks currently executing.
///
/// Insertion-ordered so the activity UI shows a stable list. Mutated only by
/// the scheduler (register on dispatch) and by completion callbacks
/// (unregister), which may run on any thread.
pub struct RunningTaskRegistry {
    running: Mutex<Vec<Arc<dyn Task>>>,
}

impl RunningTaskRegistry {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, task: Arc<dyn Task>) {
        self.running.lock().unwrap().push(task);
    }

    /// Remove a task by reference identity. A duplicate unregister (a task
    /// whose completion somehow fired twice) leaves the set untouched.
    pub(crate) fn unregister(&self, task: &Arc<dyn Task>) {
        let mut running = self.running.lock().unwrap();
        match running.iter().position(|t| Arc::ptr_eq(t, task)) {
            Some(index) => {
                running.remove(index);
            }
            None => {
                debug!("Unregister for task not in registry: {}", task.title());
            }
        }
    }

    /// Ordered copy of the currently running tasks.
    pub fn snapshot(&self) -> Vec<Arc<dyn Task>> {
        self.running.lock().unwrap().clone()
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().unwrap().len()
    }
}

impl Default for RunningTaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One row of the activity list: same-titled tasks collapsed into a count,
/// running entries ahead of queued ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub title: String,
    pub count: usize,
    pub running: bool,
}

/// Build the activity view model: running tasks grouped by title in
/// first-seen order, then queued tasks folded into matching groups or
/// appended as waiting groups.
pub fn activity(registry: &RunningTaskRegistry, queue: &QueueProvider) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();

    for task in registry.snapshot() {
        let title = task.title();
        match groups.iter_mut().find(|g| g.title == title) {
            Some(group) => group.count += 1,
            None => groups.push(TaskGroup {
                title,
                count: 1,
                running: true,
            }),
        }
    }

    for task in queue.snapshot() {
        let title = task.title();
        match groups.iter_mut().find(|g| g.title == title) {
            Some(group) => group.count += 1,
            None => groups.push(TaskGroup {
                title,
                count: 1,
                running: false,
            }),
        }
    }

    groups
}
