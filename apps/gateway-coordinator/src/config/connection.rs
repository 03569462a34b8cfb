//! Connection lifecycle configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::use_cases::{DEFAULT_TEST_CLIENT_ID_OFFSET, KeepAliveSchedule};

/// Connection lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Added to a profile's client id when testing a stored profile, so a
    /// test never collides with the live session.
    #[serde(default = "default_test_client_id_offset")]
    pub test_client_id_offset: i32,
    /// Shortest keep-alive tick, in seconds.
    #[serde(default = "default_keep_alive_floor_secs")]
    pub keep_alive_floor_secs: u64,
    /// Tick used while no profile has keep-alive enabled, in seconds.
    #[serde(default = "default_keep_alive_idle_poll_secs")]
    pub keep_alive_idle_poll_secs: u64,
}

impl ConnectionConfig {
    /// Keep-alive timer parameters.
    #[must_use]
    pub const fn schedule(&self) -> KeepAliveSchedule {
        KeepAliveSchedule {
            floor: Duration::from_secs(self.keep_alive_floor_secs),
            idle_poll: Duration::from_secs(self.keep_alive_idle_poll_secs),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            test_client_id_offset: default_test_client_id_offset(),
            keep_alive_floor_secs: default_keep_alive_floor_secs(),
            keep_alive_idle_poll_secs: default_keep_alive_idle_poll_secs(),
        }
    }
}

const fn default_test_client_id_offset() -> i32 {
    DEFAULT_TEST_CLIENT_ID_OFFSET
}

const fn default_keep_alive_floor_secs() -> u64 {
    30
}

const fn default_keep_alive_idle_poll_secs() -> u64 {
    60
}
