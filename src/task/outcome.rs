//! Terminal task states and counters.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinError;

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// Deadline passed; the work was abandoned.
    TimedOut,
    /// The work returned an error.
    Failed(String),
    Panicked(String),
    /// Stopped by `join` after its timeout.
    Cancelled,
}

impl TaskOutcome {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Failed(_) => "failed",
            Self::Panicked(_) => "panicked",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify a finished run. Anything after a cancellation request counts
    /// as cancelled, except panics.
    pub(super) fn from_join(result: Result<anyhow::Result<()>, JoinError>, cancelled: bool) -> Self {
        match result {
            Err(err) if err.is_panic() => Self::Panicked(panic_message(err.into_panic())),
            Err(_) => Self::Cancelled,
            Ok(_) if cancelled => Self::Cancelled,
            Ok(Ok(())) => Self::Completed,
            Ok(Err(err)) => Self::Failed(format!("{err:#}")),
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) | Self::Panicked(msg) => write!(f, "{}: {msg}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Render a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

/// Cumulative terminal counts. Panics count as failures.
#[derive(Debug, Default)]
pub(super) struct TaskStats {
    completed: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl TaskStats {
    pub fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Completed => &self.completed,
            TaskOutcome::TimedOut => &self.timed_out,
            TaskOutcome::Failed(_) | TaskOutcome::Panicked(_) => &self.failed,
            TaskOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TaskCounts {
        TaskCounts {
            completed: self.completed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TaskStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub completed: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl TaskCounts {
    pub const fn total(&self) -> u64 {
        self.completed + self.timed_out + self.failed + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_payloads() {
        let err = tokio::spawn(async { panic!("boom-str") }).await.unwrap_err();
        assert_eq!(
            TaskOutcome::from_join(Err(err), false),
            TaskOutcome::Panicked("boom-str".into())
        );

        let err = tokio::spawn(async { panic!("{}", String::from("boom-string")) })
            .await
            .unwrap_err();
        assert_eq!(panic_message(err.into_panic()), "boom-string");
    }

    #[tokio::test]
    async fn test_abort_is_cancelled() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            anyhow::Ok(())
        });
        handle.abort();
        let result = handle.await;
        assert_eq!(TaskOutcome::from_join(result, false), TaskOutcome::Cancelled);
    }

    #[test]
    fn test_classification() {
        assert_eq!(TaskOutcome::from_join(Ok(Ok(())), false), TaskOutcome::Completed);
        assert_eq!(TaskOutcome::from_join(Ok(Ok(())), true), TaskOutcome::Cancelled);
        assert_eq!(
            TaskOutcome::from_join(Ok(Err(anyhow::anyhow!("bad"))), false),
            TaskOutcome::Failed("bad".into())
        );
        assert_eq!(
            TaskOutcome::from_join(Ok(Err(anyhow::anyhow!("unwinding"))), true),
            TaskOutcome::Cancelled
        );
    }

    #[test]
    fn test_stats_counts() {
        let stats = TaskStats::default();
        stats.record(&TaskOutcome::Completed);
        stats.record(&TaskOutcome::Panicked("x".into()));
        stats.record(&TaskOutcome::Failed("y".into()));
        stats.record(&TaskOutcome::TimedOut);
        let counts = stats.snapshot();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.timed_out, 1);
        assert_eq!(counts.cancelled, 0);
        assert_eq!(counts.total(), 4);
    }
}
