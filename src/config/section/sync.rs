//! `[sync]` section configuration.
//!
//! ```toml
//! [sync]
//! channel_capacity = 1000   # Saved batches buffered per page
//! stop_timeout_ms = 500     # Bounded wait when cancelling a sync loop
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Page synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Capacity of each page's delta channel. A full channel blocks `save()`.
    pub channel_capacity: usize,

    /// How long a closing connection waits for its sync loop to stop.
    pub stop_timeout_ms: u64,
}

impl SyncConfig {
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            stop_timeout_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::test_parse_config;

    #[test]
    fn test_sync_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.sync.channel_capacity, 1000);
        assert_eq!(config.sync.stop_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_sync_config_partial_override() {
        let config = test_parse_config("[sync]\nchannel_capacity = 8");
        assert_eq!(config.sync.channel_capacity, 8);
        assert_eq!(config.sync.stop_timeout_ms, 500);
    }
}
