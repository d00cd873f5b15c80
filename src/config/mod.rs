use std::env;
use std::time::Duration;

/// Tuning knobs for the scheduler, loaded from the environment.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How many non-exempt tasks may run at once.
    pub worker_slots: usize,
    /// Cadence of the scheduling tick, in milliseconds.
    pub tick_interval_ms: u64,
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            worker_slots: env::var("TRACKWORK_WORKER_SLOTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
            tick_interval_ms: env::var("TRACKWORK_TICK_INTERVAL_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_slots: 3,
            tick_interval_ms: 100,
        }
    }
}
