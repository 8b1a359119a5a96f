//! Units of background work.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Boxed result future of an async unit of work.
pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

type CancellableFn = Box<dyn FnOnce(CancellationToken) -> WorkFuture + Send + 'static>;
type BlockingFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// Execution class of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    /// Runs on the event loop.
    Async,
    /// Delegated to the blocking thread pool.
    Blocking,
}

impl WorkKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::Blocking => "blocking",
        }
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a [`TaskManager`](super::TaskManager) can run.
pub enum Work {
    Async(WorkFuture),
    /// Async work that watches a token and unwinds when it fires.
    Cancellable(CancellableFn),
    Blocking(BlockingFn),
}

impl Work {
    pub fn future<F>(fut: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Async(Box::pin(fut))
    }

    pub fn cancellable<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::Cancellable(Box::new(move |token: CancellationToken| -> WorkFuture {
            Box::pin(f(token))
        }))
    }

    pub fn blocking<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::Blocking(Box::new(f))
    }

    pub const fn kind(&self) -> WorkKind {
        match self {
            Self::Async(_) | Self::Cancellable(_) => WorkKind::Async,
            Self::Blocking(_) => WorkKind::Blocking,
        }
    }

    /// Start the work on the current runtime.
    pub(super) fn start(self, token: CancellationToken) -> JoinHandle<anyhow::Result<()>> {
        match self {
            Self::Async(fut) => tokio::spawn(fut),
            Self::Cancellable(f) => tokio::spawn(f(token)),
            Self::Blocking(f) => tokio::task::spawn_blocking(f),
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Work").field(&self.kind()).finish()
    }
}
