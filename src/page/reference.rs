//! Path handles into a page.
//!
//! A [`Ref`] accumulates a path. Extending it returns a new handle and never
//! touches the page; only [`Ref::set`] records a change.

use super::{ChangeOp, Page, PageError};
use crate::core::{IntoKey, KEY_SEP, Key, Value};

/// Lazy handle to a location inside a card.
#[derive(Debug, Clone)]
pub struct Ref<'p> {
    page: &'p Page,
    path: String,
}

impl<'p> Ref<'p> {
    pub(super) fn new(page: &'p Page, path: String) -> Self {
        Self { page, path }
    }

    /// Space-joined path from the card key.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extend by a field name.
    pub fn field(&self, name: &str) -> Result<Self, PageError> {
        self.at(name)
    }

    /// Extend by a list index.
    pub fn index(&self, index: usize) -> Self {
        self.join(&Key::index(index))
    }

    /// Extend by any key.
    pub fn at(&self, key: impl IntoKey) -> Result<Self, PageError> {
        Ok(self.join(&key.into_key()?))
    }

    /// Assign `value` to `key` below this handle.
    ///
    /// Data placeholders are rejected: they may only be card fields.
    pub fn set(&self, key: impl IntoKey, value: impl Into<Value>) -> Result<(), PageError> {
        let key = key.into_key()?;
        let value = value.into();
        if value.is_data() {
            return Err(PageError::DataAssignment);
        }
        self.page.track(ChangeOp::Set {
            path: format!("{}{KEY_SEP}{key}", self.path),
            value: value.dump(),
        });
        Ok(())
    }

    fn join(&self, key: &Key) -> Self {
        Self {
            page: self.page,
            path: format!("{}{KEY_SEP}{key}", self.path),
        }
    }
}
