pub mod commands;
pub mod config;
pub mod pool;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod task;

pub use config::SchedulerConfig;
pub use pool::WorkerPool;
pub use provider::{ContinuousProvider, Promise, QueueProvider, TaskProvider};
pub use registry::{activity, RunningTaskRegistry, TaskGroup};
pub use scheduler::Scheduler;
pub use shutdown::{QuitDecision, QuitWarning, ShutdownCoordinator, ShutdownState};
pub use task::{Completion, Task};
