//! Bounded background task manager.
//!
//! Every task passes an admission gate (`Arc<Semaphore>` with `capacity`
//! permits) before it starts. The owned permit lives in the task's [`Slot`],
//! so it is released exactly once however the task ends.
//!
//! ```text
//! spawn ──▶ waiting ──(permit)──▶ running ──▶ completed | failed | panicked
//!                                         ├─▶ timed out (deadline)
//!                                         └─▶ cancelled (join)
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::outcome::{TaskCounts, TaskOutcome, TaskStats};
use super::{TaskError, Work, WorkKind};
use crate::config::TasksConfig;
use crate::{debug, log};

/// Identifier of a spawned task, unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Non-terminal task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Waiting,
    Running,
}

/// Admission and timing limits.
#[derive(Debug, Clone)]
pub struct TaskLimits {
    pub capacity: usize,
    pub max_running_time: Duration,
    pub cancel_grace: Duration,
    pub allow_blocking: bool,
}

impl From<&TasksConfig> for TaskLimits {
    fn from(config: &TasksConfig) -> Self {
        Self {
            capacity: config.pool_size,
            max_running_time: config.max_running_time(),
            cancel_grace: config.cancel_grace(),
            allow_blocking: config.allow_blocking,
        }
    }
}

struct Inner {
    name: String,
    limits: TaskLimits,
    gate: Arc<Semaphore>,
    tasks: Mutex<FxHashMap<TaskId, TaskState>>,
    idle: Notify,
    next_id: AtomicU64,
    stats: TaskStats,
    /// Set by `join`; no new spawns after this.
    closing: AtomicBool,
    /// Cooperative stop signal; parent of every task token.
    cancel: CancellationToken,
    /// Stop tracking whatever is still running.
    abandon: CancellationToken,
}

impl Inner {
    fn finish(&self, id: TaskId, kind: WorkKind, outcome: &TaskOutcome) {
        self.stats.record(outcome);
        match outcome {
            TaskOutcome::Completed | TaskOutcome::Cancelled => {
                debug!("task"; "{}: {} ({}) {}", self.name, id, kind, outcome);
            }
            TaskOutcome::TimedOut => {
                log!("task"; "{}: {} ({}) timed out after {:?}, abandoned",
                    self.name, id, kind, self.limits.max_running_time);
            }
            TaskOutcome::Failed(_) | TaskOutcome::Panicked(_) => {
                log!("task"; "{}: {} ({}) {}", self.name, id, kind, outcome);
            }
        }
    }

    fn count(&self, state: TaskState) -> usize {
        self.tasks.lock().values().filter(|s| **s == state).count()
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.tasks.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Registry entry of one task. Dropping it forgets the task and releases
/// its permit.
struct Slot {
    id: TaskId,
    inner: Arc<Inner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.permit.take();
        let mut tasks = self.inner.tasks.lock();
        tasks.remove(&self.id);
        if tasks.is_empty() {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Spawns background work under a concurrency cap and per-task deadline.
///
/// Faults in the work are logged and counted, never returned to the spawner.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    pub fn new(name: impl Into<String>, limits: TaskLimits) -> Self {
        let capacity = limits.capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                limits: TaskLimits { capacity, ..limits },
                gate: Arc::new(Semaphore::new(capacity)),
                tasks: Mutex::new(FxHashMap::default()),
                idle: Notify::new(),
                next_id: AtomicU64::new(0),
                stats: TaskStats::default(),
                closing: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                abandon: CancellationToken::new(),
            }),
        }
    }

    /// Start `work` once a slot is free.
    ///
    /// Waits for admission. Returns after the work has started; its result is
    /// only logged.
    pub async fn spawn(&self, work: Work) -> Result<TaskId, TaskError> {
        let kind = work.kind();
        if kind == WorkKind::Blocking && !self.inner.limits.allow_blocking {
            return Err(TaskError::InvalidTaskKind(kind));
        }
        if self.inner.closing.load(Ordering::Acquire) {
            return Err(TaskError::ShuttingDown);
        }

        let id = TaskId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner.tasks.lock().insert(id, TaskState::Waiting);
        let mut slot = Slot {
            id,
            inner: Arc::clone(&self.inner),
            permit: None,
        };

        let permit = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(TaskError::ShuttingDown),
            permit = Arc::clone(&self.inner.gate).acquire_owned() => {
                permit.map_err(|_| TaskError::ShuttingDown)?
            }
        };
        slot.permit = Some(permit);

        let token = self.inner.cancel.child_token();
        let handle = work.start(token.clone());
        if let Some(state) = self.inner.tasks.lock().get_mut(&id) {
            *state = TaskState::Running;
        }
        debug!("task"; "{}: {} ({}) started", self.inner.name, id, kind);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = supervise(handle, &token, &inner).await;
            inner.finish(id, kind, &outcome);
            drop(slot);
        });
        Ok(id)
    }

    /// Let outstanding tasks finish within `timeout`, then cancel them.
    ///
    /// Cancelled tasks get the configured grace period to unwind; anything
    /// still running after that is abandoned. Safe to call repeatedly. The
    /// manager accepts no new work afterwards.
    pub async fn join(&self, timeout: Duration) {
        let inner = &self.inner;
        inner.closing.store(true, Ordering::Release);

        if tokio::time::timeout(timeout, inner.wait_idle()).await.is_ok() {
            return;
        }

        let outstanding = inner.tasks.lock().len();
        debug!("task"; "{}: cancelling {} outstanding task(s)", inner.name, outstanding);
        inner.cancel.cancel();
        if tokio::time::timeout(inner.limits.cancel_grace, inner.wait_idle())
            .await
            .is_ok()
        {
            return;
        }

        inner.abandon.cancel();
        if tokio::time::timeout(inner.limits.cancel_grace, inner.wait_idle())
            .await
            .is_err()
        {
            log!("task"; "{}: {} task(s) did not stop", inner.name, inner.tasks.lock().len());
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn capacity(&self) -> usize {
        self.inner.limits.capacity
    }

    /// No task is waiting or running.
    pub fn is_empty(&self) -> bool {
        self.inner.tasks.lock().is_empty()
    }

    /// Every slot is taken.
    pub fn is_full(&self) -> bool {
        self.available_slots() == 0
    }

    pub fn running(&self) -> usize {
        self.inner.count(TaskState::Running)
    }

    pub fn waiting(&self) -> usize {
        self.inner.count(TaskState::Waiting)
    }

    pub fn available_slots(&self) -> usize {
        self.inner.gate.available_permits()
    }

    pub fn stats(&self) -> TaskCounts {
        self.inner.stats.snapshot()
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.limits.capacity)
            .field("tasks", &self.inner.tasks.lock().len())
            .finish()
    }
}

/// Race the work against its deadline and the abandon signal.
async fn supervise(
    mut handle: JoinHandle<anyhow::Result<()>>,
    token: &CancellationToken,
    inner: &Inner,
) -> TaskOutcome {
    tokio::select! {
        result = tokio::time::timeout(inner.limits.max_running_time, &mut handle) => match result {
            Ok(joined) => TaskOutcome::from_join(joined, token.is_cancelled()),
            Err(_) => {
                handle.abort();
                TaskOutcome::TimedOut
            }
        },
        () = inner.abandon.cancelled() => {
            handle.abort();
            TaskOutcome::Cancelled
        }
    }
}
