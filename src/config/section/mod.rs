//! Configuration section definitions.
//!
//! Each module corresponds to a section in `wavesync.toml`:
//!
//! | Module  | TOML Section | Purpose                               |
//! |---------|--------------|---------------------------------------|
//! | `serve` | `[serve]`    | Listener address, verbosity           |
//! | `sync`  | `[sync]`     | Per-page delta channel                |
//! | `tasks` | `[tasks]`    | Background task admission and timeouts |

mod serve;
mod sync;
mod tasks;

pub use serve::ServeConfig;
pub use sync::SyncConfig;
pub use tasks::TasksConfig;
