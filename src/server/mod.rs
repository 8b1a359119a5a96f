//! WebSocket server.
//!
//! # Architecture
//!
//! ```text
//! acceptor thread --[TcpStream]--> Server::run
//!                                     |
//!                        handshake (blocking pool)
//!                                     |
//!   transport thread <--[String]--> Connection (tokio task)
//!     (poll loop)                     |
//!                               Session: pages, user, tasks
//! ```

mod connection;
mod listener;
mod transport;


pub use connection::Connection;
pub use listener::bind;
#[cfg(test)]
use transport::{SESSION_HEADER, SESSION_PARAM};

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::app::App;
use crate::config::AppConfig;
use crate::core::register_shutdown;
use crate::session::SessionRegistry;

/// Frames buffered per direction of one connection.
const FRAME_BUFFER: usize = 64;

/// Serves an [`App`] over WebSocket.
#[derive(Debug, Clone)]
pub struct Server {
    app: Arc<App>,
    config: Arc<AppConfig>,
    sessions: Arc<SessionRegistry>,
}

impl Server {
    pub fn new(app: App, config: Arc<AppConfig>) -> Self {
        Self {
            app: Arc::new(app),
            sessions: Arc::new(SessionRegistry::new(Arc::clone(&config))),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Bind the configured address and serve until Ctrl+C.
    pub async fn run(self) -> Result<()> {
        let (listener, addr) = bind(self.config.serve.interface, self.config.serve.port)?;
        crate::log!("serve"; "listening on ws://{}", addr);
        crate::log!("serve"; "routes: {}", self.app.routes().join(", "));

        let (stop_tx, stop_rx) = crossbeam::channel::bounded(1);
        register_shutdown(stop_tx);
        self.run_on(listener, stop_rx).await
    }

    /// Serve connections from `listener` until `stop` fires or shutdown is
    /// requested, then wait for open connections to tear down.
    pub async fn run_on(
        self,
        listener: TcpListener,
        stop: crossbeam::channel::Receiver<()>,
    ) -> Result<()> {
        let (stream_tx, mut streams) = mpsc::channel(FRAME_BUFFER);
        let acceptor = listener::spawn_acceptor(listener, stream_tx, stop)?;

        let mut connections = JoinSet::new();
        while let Some(stream) = streams.recv().await {
            connections.spawn(self.clone().connect(stream));
            while connections.try_join_next().is_some() {}
        }

        let tasks = &self.config.tasks;
        let drain = self.config.sync.stop_timeout() + tasks.join_timeout() + tasks.cancel_grace() * 2;
        if !connections.is_empty() {
            crate::log!("serve"; "closing {} connection(s)", connections.len());
        }
        if tokio::time::timeout(drain, async {
            while connections.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            connections.abort_all();
        }

        let _ = acceptor.join();
        crate::log!("serve"; "stopped");
        Ok(())
    }

    /// Handshake, then bridge the socket to a [`Connection`] until the
    /// client leaves.
    pub(crate) async fn connect(self, stream: TcpStream) {
        let peer = stream.peer_addr().ok();
        let handshake = tokio::task::spawn_blocking(move || transport::handshake(stream))
            .await
            .context("handshake task failed");
        let (ws, session_id) = match handshake.and_then(|r| r) {
            Ok(pair) => pair,
            Err(e) => {
                crate::log!("conn"; "{:?}: {}", peer, e);
                return;
            }
        };

        let (inbound_tx, inbound_rx) = mpsc::channel(FRAME_BUFFER);
        let (outbound_tx, outbound_rx) = mpsc::channel(FRAME_BUFFER);
        let spawned = std::thread::Builder::new()
            .name(format!("wavesync-ws-{session_id}"))
            .spawn(move || transport::pump(ws, inbound_tx, outbound_rx));
        if let Err(e) = spawned {
            crate::log!("conn"; "failed to start transport: {}", e);
            return;
        }

        crate::debug!("conn"; "{} connected as {}", peer.map(|p| p.to_string()).unwrap_or_default(), session_id);
        Connection::attach(
            Arc::clone(&self.app),
            Arc::clone(&self.sessions),
            &session_id,
            outbound_tx,
        )
        .run(inbound_rx)
        .await;
    }
}

/// Run `app` on a multi-threaded runtime until Ctrl+C.
pub fn serve(app: App, config: Arc<AppConfig>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("wavesync")
        .build()?;
    runtime.block_on(Server::new(app, config).run())
}
