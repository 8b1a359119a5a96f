//! `[tasks]` section configuration.
//!
//! ```toml
//! [tasks]
//! pool_size = 10            # Tasks running at once, per session
//! max_running_time = 300    # Per-task deadline (seconds)
//! join_timeout = 3          # Seconds join() waits before cancelling
//! cancel_grace_ms = 2000    # Unwinding window after cancellation
//! allow_blocking = true     # Accept work delegated to the blocking pool
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Background task settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// Admission capacity.
    pub pool_size: usize,

    /// Deadline for a single task, in seconds.
    pub max_running_time: u64,

    /// How long `join` lets outstanding tasks finish, in seconds.
    pub join_timeout: u64,

    /// Extra time cancelled tasks get to unwind, in milliseconds.
    pub cancel_grace_ms: u64,

    /// Accept blocking closures (run on tokio's blocking pool).
    pub allow_blocking: bool,
}

impl TasksConfig {
    pub const fn max_running_time(&self) -> Duration {
        Duration::from_secs(self.max_running_time)
    }

    pub const fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout)
    }

    pub const fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_running_time: 300,
            join_timeout: 3,
            cancel_grace_ms: 2000,
            allow_blocking: true,
        }
    }
}
