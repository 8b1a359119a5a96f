//! Session registry.

use std::sync::Arc;

use dashmap::DashMap;

use super::Session;
use crate::config::AppConfig;

struct Entry {
    session: Arc<Session>,
    /// Live connections using the session.
    connections: usize,
}

/// All live sessions of one server, by id.
pub struct SessionRegistry {
    config: Arc<AppConfig>,
    sessions: DashMap<String, Entry>,
}

impl SessionRegistry {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    /// The session for `id`, created with empty pages and user state if absent.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        Arc::clone(&self.entry(id).session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|e| Arc::clone(&e.session))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of connections attached to `id`.
    pub fn connections(&self, id: &str) -> usize {
        self.sessions.get(id).map_or(0, |e| e.connections)
    }

    /// [`get_or_create`](Self::get_or_create) on behalf of a connection.
    /// Pair with [`detach`](Self::detach).
    pub(crate) fn attach(&self, id: &str) -> Arc<Session> {
        let mut entry = self.entry(id);
        entry.connections += 1;
        Arc::clone(&entry.session)
    }

    /// Release a connection's hold on `id`.
    ///
    /// The last connection out removes the session and gets it back to tear
    /// down. Later attaches with the same id start a fresh session.
    pub(crate) fn detach(&self, id: &str) -> Option<Arc<Session>> {
        let (_, entry) = self.sessions.remove_if_mut(id, |_, entry| {
            entry.connections = entry.connections.saturating_sub(1);
            entry.connections == 0
        })?;
        crate::debug!("session"; "{} ended", id);
        Some(entry.session)
    }

    fn entry(&self, id: &str) -> dashmap::mapref::one::RefMut<'_, String, Entry> {
        self.sessions.entry(id.to_string()).or_insert_with(|| {
            crate::log!("session"; "{} started", id);
            Entry {
                session: Arc::new(Session::new(id, Arc::clone(&self.config))),
                connections: 0,
            }
        })
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
