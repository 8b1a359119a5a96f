//! Addressable keys.
//!
//! A key is either a card/field name or a list index. Paths into a page are
//! keys joined with a single space, so names can never contain whitespace.

use std::fmt;

use thiserror::Error;

/// Separator between keys in a path.
pub const KEY_SEP: char = ' ';

/// Rejected key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("keys cannot contain spaces: `{0}`")]
    Whitespace(String),

    #[error("keys cannot be empty")]
    Empty,
}

/// A validated path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    /// Validate a named key.
    pub fn name(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        guard_name(&name)?;
        Ok(Self::Name(name))
    }

    pub const fn index(index: usize) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Check a string key: non-empty, no whitespace.
pub fn guard_name(name: &str) -> Result<(), KeyError> {
    if name.is_empty() {
        return Err(KeyError::Empty);
    }
    if name.chars().any(char::is_whitespace) {
        return Err(KeyError::Whitespace(name.to_string()));
    }
    Ok(())
}

/// Conversion into a validated [`Key`].
///
/// Strings are checked, indices always succeed.
pub trait IntoKey {
    fn into_key(self) -> Result<Key, KeyError>;
}

impl IntoKey for Key {
    fn into_key(self) -> Result<Key, KeyError> {
        Ok(self)
    }
}

impl IntoKey for &str {
    fn into_key(self) -> Result<Key, KeyError> {
        Key::name(self)
    }
}

impl IntoKey for String {
    fn into_key(self) -> Result<Key, KeyError> {
        Key::name(self)
    }
}

impl IntoKey for &String {
    fn into_key(self) -> Result<Key, KeyError> {
        Key::name(self.as_str())
    }
}

impl IntoKey for usize {
    fn into_key(self) -> Result<Key, KeyError> {
        Ok(Key::Index(self))
    }
}
