//! Per-connection frame dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::app::{self, App, Query};
use crate::page::{AsyncPage, Batch};
use crate::session::{Session, SessionRegistry};
use crate::wire::{Action, ClientFrame, Payload, ServerFrame};

/// The active sync loop of a connection.
struct Watch {
    route: String,
    stop: CancellationToken,
    forwarder: JoinHandle<()>,
}

/// Drives one client: reads frames, runs handlers, forwards page deltas.
pub struct Connection {
    app: Arc<App>,
    sessions: Arc<SessionRegistry>,
    session: Arc<Session>,
    outbound: mpsc::Sender<String>,
    watch: Option<Watch>,
    handlers: JoinSet<()>,
    stop_timeout: Duration,
    join_timeout: Duration,
}

impl Connection {
    /// Attach to session `id` in `sessions`, creating it if needed.
    ///
    /// The session is torn down when its last connection ends.
    pub fn attach(
        app: Arc<App>,
        sessions: Arc<SessionRegistry>,
        id: &str,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        let session = sessions.attach(id);
        let config = session.config();
        let stop_timeout = config.sync.stop_timeout();
        let join_timeout = config.tasks.join_timeout();
        Self {
            app,
            sessions,
            session,
            outbound,
            watch: None,
            handlers: JoinSet::new(),
            stop_timeout,
            join_timeout,
        }
    }

    /// Handle frames until the client goes away, then tear down.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>) {
        while let Some(text) = inbound.recv().await {
            self.dispatch(&text).await;
            while self.handlers.try_join_next().is_some() {}
        }
        self.teardown().await;
    }

    async fn dispatch(&mut self, text: &str) {
        let Some(frame) = ClientFrame::parse(text) else {
            crate::debug!("conn"; "{}: dropped malformed frame", self.session.id());
            return;
        };
        match frame.action {
            Action::Watch => self.watch(frame.address, frame.decode()).await,
            Action::Query => self.query(frame.address, frame.decode()).await,
            Action::Patch => self.patch(frame.address, frame.payload).await,
            Action::Noop => {}
        }
    }

    /// Subscribe to `route`: snapshot first, then deltas, then the initial
    /// handler run.
    async fn watch(&mut self, route: &str, payload: Payload) {
        self.stop_watch().await;

        if !self.app.has_route(route) {
            crate::debug!("conn"; "{}: watch on unknown route {}", self.session.id(), route);
            self.send(ServerFrame::not_found().to_json()).await;
            return;
        }

        let page = self.session.page(route);
        let snapshot = match page.start_sync().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                crate::debug!("sync"; "{}: not watching: {}", self.session.id(), e);
                return;
            }
        };
        self.send(ServerFrame::Snapshot(snapshot).to_json()).await;

        let stop = CancellationToken::new();
        let forwarder = tokio::spawn(forward(
            Arc::clone(&page),
            self.outbound.clone(),
            stop.clone(),
        ));
        crate::debug!("sync"; "{}: watching {}", self.session.id(), route);
        self.watch = Some(Watch {
            route: route.to_string(),
            stop,
            forwarder,
        });

        self.query(route, payload).await;
    }

    /// Run the route handler in the background.
    async fn query(&mut self, route: &str, payload: Payload) {
        let Some(handler) = self.app.handler(route) else {
            self.send(ServerFrame::not_found().to_json()).await;
            return;
        };
        let query = Query::new(route, payload, Arc::clone(&self.session));
        let route = route.to_string();
        self.handlers.spawn(async move {
            if let Err(e) = app::run_handler(handler, query).await {
                crate::debug!("conn"; "{}: error card not delivered: {}", route, e);
            }
        });
    }

    /// Apply client-sent ops to the route's page and save.
    async fn patch(&mut self, route: &str, payload: &str) {
        let patch = serde_json::from_str::<Json>(payload).unwrap_or(Json::Null);
        let batch = Batch::from_json(&patch);
        if batch.is_empty() {
            return;
        }

        let page = self.session.page(route);
        for op in batch {
            page.track(op);
        }
        if let Err(e) = page.save().await {
            crate::debug!("sync"; "{}: patch not saved: {}", route, e);
        }
    }

    /// Cancel the sync loop and wait for it, bounded by the stop timeout.
    async fn stop_watch(&mut self) {
        let Some(watch) = self.watch.take() else {
            return;
        };
        watch.stop.cancel();
        let abort = watch.forwarder.abort_handle();
        if tokio::time::timeout(self.stop_timeout, watch.forwarder).await.is_err() {
            crate::log!("sync"; "{}: sync loop did not stop in time", watch.route);
            abort.abort();
        }
    }

    /// Stop this connection's work. The last connection of a session also
    /// closes its pages and joins its tasks.
    async fn teardown(mut self) {
        self.stop_watch().await;
        if let Some(session) = self.sessions.detach(self.session.id()) {
            session.close_pages();
            session.tasks().join(self.join_timeout).await;
        }
        self.handlers.abort_all();
        while self.handlers.join_next().await.is_some() {}
        crate::debug!("conn"; "{}: disconnected", self.session.id());
    }

    async fn send(&self, text: String) {
        let _ = self.outbound.send(text).await;
    }
}

/// Copy saved batches of `page` to the client until stopped.
async fn forward(page: Arc<AsyncPage>, outbound: mpsc::Sender<String>, stop: CancellationToken) {
    loop {
        let batch = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            batch = page.changes() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };
        if outbound.send(ServerFrame::delta(&batch).to_json()).await.is_err() {
            break;
        }
    }
}
