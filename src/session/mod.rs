//! Sessions: per-client pages, user state and background tasks.

mod id;
mod registry;

pub use id::{is_valid_session_id, new_session_id};
pub use registry::SessionRegistry;

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::config::AppConfig;
use crate::core::Expando;
use crate::page::AsyncPage;
use crate::task::{TaskLimits, TaskManager};

/// State owned by one client.
pub struct Session {
    id: String,
    started_at: SystemTime,
    config: Arc<AppConfig>,
    /// One page per route.
    pages: Mutex<FxHashMap<String, Arc<AsyncPage>>>,
    user: Mutex<Expando>,
    tasks: TaskManager,
}

impl Session {
    pub fn new(id: impl Into<String>, config: Arc<AppConfig>) -> Self {
        let id = id.into();
        let tasks = TaskManager::new(id.clone(), TaskLimits::from(&config.tasks));
        Self {
            id,
            started_at: SystemTime::now(),
            config,
            pages: Mutex::new(FxHashMap::default()),
            user: Mutex::new(Expando::new()),
            tasks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The page for `route`, created on first use.
    pub fn page(&self, route: &str) -> Arc<AsyncPage> {
        let mut pages = self.pages.lock();
        let page = pages.entry(route.to_string()).or_insert_with(|| {
            crate::debug!("page"; "{}: new page {}", self.id, route);
            Arc::new(AsyncPage::new(route, self.config.sync.channel_capacity))
        });
        Arc::clone(page)
    }

    /// Routes that have a page.
    pub fn routes(&self) -> Vec<String> {
        self.pages.lock().keys().cloned().collect()
    }

    /// User-scoped state. Do not hold the guard across an await.
    pub fn user(&self) -> MutexGuard<'_, Expando> {
        self.user.lock()
    }

    pub const fn tasks(&self) -> &TaskManager {
        &self.tasks
    }

    /// Release producers blocked on any of this session's pages.
    pub fn close_pages(&self) {
        for page in self.pages.lock().values() {
            page.close();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("pages", &self.pages.lock().len())
            .field("tasks", &self.tasks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card;

    fn session() -> Session {
        Session::new("CS2345678923456789", Arc::new(AppConfig::default()))
    }

    #[test]
    fn test_one_page_per_route() {
        let session = session();
        let a = session.page("/a");
        let again = session.page("/a");
        let b = session.page("/b");
        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));

        let mut routes = session.routes();
        routes.sort();
        assert_eq!(routes, ["/a", "/b"]);
    }

    #[test]
    fn test_user_state_persists() {
        let session = session();
        session.user().set("name", "ada");
        assert_eq!(session.user().get_str("name"), Some("ada"));
    }

    #[tokio::test]
    async fn test_close_pages_unblocks_consumers() {
        let session = session();
        let page = session.page("/a");
        page.add("k", card! {}).unwrap();
        session.close_pages();
        assert!(page.is_closed());
        assert!(page.changes().await.is_none());
    }

    #[test]
    fn test_task_manager_uses_config() {
        let session = session();
        assert_eq!(session.tasks().capacity(), 10);
        assert_eq!(session.tasks().name(), session.id());
    }
}
