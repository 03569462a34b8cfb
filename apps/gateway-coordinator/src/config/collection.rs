//! Market-data collection pacing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::CollectionPacing;

/// Collection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Pause between two timeframes of one setup, in milliseconds.
    #[serde(default = "default_between_timeframes_ms")]
    pub between_timeframes_ms: u64,
    /// Pause between two setups in a bulk run, in milliseconds.
    #[serde(default = "default_between_setups_ms")]
    pub between_setups_ms: u64,
}

impl CollectionConfig {
    /// Pacing built from these delays.
    #[must_use]
    pub const fn pacing(&self) -> CollectionPacing {
        CollectionPacing::new(
            Duration::from_millis(self.between_timeframes_ms),
            Duration::from_millis(self.between_setups_ms),
        )
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            between_timeframes_ms: default_between_timeframes_ms(),
            between_setups_ms: default_between_setups_ms(),
        }
    }
}

const fn default_between_timeframes_ms() -> u64 {
    1000
}

const fn default_between_setups_ms() -> u64 {
    3000
}
