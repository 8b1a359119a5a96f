//! Route table and handler invocation.

mod query;

pub use query::Query;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::card;
use crate::page::PageError;
use crate::task::panic_message;

/// Boxed handler future.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// A route handler.
pub type Handler = Arc<dyn Fn(Query) -> HandlerFuture + Send + Sync + 'static>;

/// Key of the card that replaces a page after a handler fault.
pub const ERROR_CARD_KEY: &str = "__unhandled_error__";

/// Maps routes to handlers.
#[derive(Clone, Default)]
pub struct App {
    routes: FxHashMap<String, Handler>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `route`, replacing any previous one.
    pub fn route<F, Fut>(mut self, route: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Query) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |q: Query| -> HandlerFuture { Box::pin(handler(q)) });
        self.routes.insert(route.into(), handler);
        self
    }

    pub fn handler(&self, route: &str) -> Option<Handler> {
        self.routes.get(route).cloned()
    }

    pub fn has_route(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    /// Registered routes, sorted.
    pub fn routes(&self) -> Vec<&str> {
        let mut routes: Vec<_> = self.routes.keys().map(String::as_str).collect();
        routes.sort_unstable();
        routes
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App").field("routes", &self.routes()).finish()
    }
}

/// Run `handler` on its own task. A returned error or a panic replaces the
/// page with an error card.
///
/// Returns `Err` only when the error card itself cannot be saved.
pub async fn run_handler(handler: Handler, query: Query) -> Result<(), PageError> {
    let page = query.page_handle();
    let route = query.route.clone();

    let detail = match tokio::spawn(handler(query)).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => format!("{err:?}"),
        Err(err) if err.is_panic() => format!("panicked: {}", panic_message(err.into_panic())),
        Err(err) => format!("handler task ended: {err}"),
    };
    crate::logger::log_detail("error", &format!("handler for {route} failed"), &detail);

    page.drop_all();
    page.add(
        ERROR_CARD_KEY,
        card! {
            "view" => "markdown",
            "box" => "1 1 12 10",
            "title" => "Error",
            "content" => format!("```\n{detail}\n```"),
        },
    )?;
    page.save().await
}
