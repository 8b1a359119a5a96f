//! Page state: cards keyed by name, plus a log of pending changes.
//!
//! Handlers mutate a [`Page`] (directly or through [`Ref`] handles). Every
//! mutation appends a [`ChangeOp`]; nothing is sent until the log is drained
//! by [`AsyncPage::save`].

mod ops;
mod reference;
mod sync;


pub use ops::{Batch, ChangeOp};
pub use reference::Ref;
pub use sync::AsyncPage;

use parking_lot::Mutex;
use serde_json::Map;
use thiserror::Error;

use crate::core::{Card, KeyError, Value, guard_name};

/// Page mutation failure.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("data placeholders can only be card fields, not path assignments")]
    DataAssignment,

    #[error("page `{0}` was closed while saving")]
    Closed(String),
}

/// A route's card tree, as seen by handlers.
#[derive(Debug)]
pub struct Page {
    url: String,
    changes: Mutex<Vec<ChangeOp>>,
}

impl Page {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            changes: Mutex::new(Vec::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Add a card, replacing any card with the same key.
    ///
    /// Data fields are moved into the buffer list: field `x` becomes
    /// `~x = <buffer index>`, placed after the plain fields.
    pub fn add(&self, key: &str, card: Card) -> Result<Ref<'_>, PageError> {
        guard_name(key)?;

        let mut fields = Map::new();
        let mut lifted = Vec::new();
        let mut buffers = Vec::new();
        for (name, value) in card {
            match value {
                Value::Data(data) => {
                    lifted.push((format!("~{name}"), buffers.len()));
                    buffers.push(data.dump());
                }
                other => {
                    fields.insert(name, other.dump());
                }
            }
        }
        for (name, index) in lifted {
            fields.insert(name, index.into());
        }

        self.track(ChangeOp::Upsert {
            key: key.to_string(),
            fields,
            buffers,
        });
        Ok(Ref::new(self, key.to_string()))
    }

    /// Handle to the card under `key`. Nothing is written until a `set`.
    pub fn get(&self, key: &str) -> Result<Ref<'_>, PageError> {
        guard_name(key)?;
        Ok(Ref::new(self, key.to_string()))
    }

    /// Remove the card under `key`.
    pub fn remove(&self, key: &str) -> Result<(), PageError> {
        guard_name(key)?;
        self.track(ChangeOp::Delete {
            key: key.to_string(),
        });
        Ok(())
    }

    /// Clear every card on the page.
    pub fn drop_all(&self) {
        self.track(ChangeOp::DropAll);
    }

    /// Number of ops not yet saved.
    pub fn pending(&self) -> usize {
        self.changes.lock().len()
    }

    pub(crate) fn track(&self, op: ChangeOp) {
        self.changes.lock().push(op);
    }

    /// Drain the pending log. `None` when there is nothing to send.
    pub(crate) fn diff(&self) -> Option<Batch> {
        let mut changes = self.changes.lock();
        if changes.is_empty() {
            return None;
        }
        Some(Batch::new(std::mem::take(&mut *changes)))
    }
}
