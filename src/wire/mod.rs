//! Wire protocol.
//!
//! Client frames are text: `<action> <address> <payload>`.
//!
//! | action | meaning |
//! |--------|---------|
//! | `*`    | patch   |
//! | `@`    | query   |
//! | `+`    | watch   |
//! | `#`    | noop    |
//!
//! Server frames are JSON: a snapshot `{"p":{"c":..}}`, a delta batch
//! `{"d":[..]}` or an error `{"e":"not_found"}`.

mod frame;
mod message;

pub use frame::{Action, ClientFrame, Payload};
pub use message::ServerFrame;
