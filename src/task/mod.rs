//! Background work: bounded admission, deadlines and orderly shutdown.

mod manager;
mod outcome;
mod work;

#[cfg(test)]
mod tests;

pub use manager::{TaskId, TaskLimits, TaskManager};
pub use outcome::panic_message;
pub use work::{Work, WorkKind};

use thiserror::Error;

/// Spawn rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("this manager does not accept {0} work")]
    InvalidTaskKind(WorkKind),

    #[error("task manager is shutting down")]
    ShuttingDown,
}
