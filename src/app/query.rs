//! Handler context.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use parking_lot::MutexGuard;
use tokio_util::sync::CancellationToken;

use crate::core::Expando;
use crate::page::AsyncPage;
use crate::session::Session;
use crate::task::{TaskError, TaskId, Work, panic_message};
use crate::wire::Payload;

/// Everything a handler gets for one query.
#[derive(Debug, Clone)]
pub struct Query {
    pub route: String,
    pub args: Expando,
    pub events: Expando,
    page: Arc<AsyncPage>,
    session: Arc<Session>,
}

impl Query {
    pub fn new(route: &str, payload: Payload, session: Arc<Session>) -> Self {
        Self {
            route: route.to_string(),
            args: payload.args,
            events: payload.events,
            page: session.page(route),
            session,
        }
    }

    /// The page for this query's route.
    pub fn page(&self) -> &AsyncPage {
        &self.page
    }

    /// Owned page handle, for moving into background work.
    pub fn page_handle(&self) -> Arc<AsyncPage> {
        Arc::clone(&self.page)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// User-scoped state of the session. Do not hold across an await.
    pub fn user(&self) -> MutexGuard<'_, Expando> {
        self.session.user()
    }

    pub async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// Run `fut` on the session's task manager.
    ///
    /// Returns once the task is admitted. Its result is logged, not returned.
    pub async fn run_in_back<F>(&self, fut: F) -> Result<TaskId, TaskError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.session.tasks().spawn(Work::future(fut)).await
    }

    /// Like [`Query::run_in_back`], for work that stops when asked.
    pub async fn run_cancellable<F, Fut>(&self, f: F) -> Result<TaskId, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.session.tasks().spawn(Work::cancellable(f)).await
    }

    /// Run a blocking function on a worker thread and wait for its result.
    pub async fn exec_blocking<F, R>(&self, f: F) -> anyhow::Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match tokio::task::spawn_blocking(f).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_panic() => Err(anyhow!(
                "blocking call panicked: {}",
                panic_message(err.into_panic())
            )),
            Err(err) => Err(anyhow!("blocking call cancelled: {err}")),
        }
    }
}
