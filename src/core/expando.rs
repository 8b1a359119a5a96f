//! Expando: an ordered bag of named values.
//!
//! Carries request arguments, events and per-user state. Missing names read
//! as `None` rather than failing.

use std::fmt;

use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expando {
    entries: Map<String, Json>,
}

impl Expando {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        self.entries.get(name)
    }

    /// Read a string entry.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Json::as_str)
    }

    /// Read an entry as a flag: present and not `false`/`null`.
    pub fn is_set(&self, name: &str) -> bool {
        !matches!(self.get(name), None | Some(Json::Null | Json::Bool(false)))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Json>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Json> {
        self.entries.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Json)> {
        self.entries.iter()
    }

    /// Export the underlying mapping.
    pub fn to_map(&self) -> Map<String, Json> {
        self.entries.clone()
    }

    pub fn into_map(self) -> Map<String, Json> {
        self.entries
    }

    /// Copy entries into `target`.
    ///
    /// With `include`, only those names are copied (missing ones as `null`).
    /// Names in `exclude` are always skipped.
    pub fn copy_into(&self, target: &mut Self, include: Option<&[&str]>, exclude: &[&str]) {
        match include {
            Some(names) => {
                for name in names.iter().filter(|n| !exclude.contains(n)) {
                    let value = self.get(name).cloned().unwrap_or(Json::Null);
                    target.set(*name, value);
                }
            }
            None => {
                for (name, value) in self.iter() {
                    if !exclude.contains(&name.as_str()) {
                        target.set(name.clone(), value.clone());
                    }
                }
            }
        }
    }

    /// Shallow clone restricted by `include` / `exclude`.
    pub fn clone_with(&self, include: Option<&[&str]>, exclude: &[&str]) -> Self {
        let mut target = Self::new();
        self.copy_into(&mut target, include, exclude);
        target
    }
}

impl From<Map<String, Json>> for Expando {
    fn from(entries: Map<String, Json>) -> Self {
        Self { entries }
    }
}

impl fmt::Display for Expando {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.entries {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{name}:{value}")?;
            first = false;
        }
        Ok(())
    }
}
