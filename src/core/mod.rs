//! Core types - keys, card values, data placeholders and shared state.

mod data;
mod expando;
mod key;
mod state;
mod value;

#[cfg(test)]
pub use data::data;
pub use expando::Expando;
pub use key::{IntoKey, KEY_SEP, Key, KeyError, guard_name};
pub use state::{is_shutdown, register_shutdown, setup_shutdown_handler};
pub use value::{Card, Value};
