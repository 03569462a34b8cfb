//! Delays between collection requests so bulk runs do not flood the
//! brokerage service.

use std::time::Duration;

/// Pauses inserted by bulk collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionPacing {
    /// Pause between consecutive timeframes of one setup.
    pub between_timeframes: Duration,
    /// Pause between consecutive setups.
    pub between_setups: Duration,
}

impl CollectionPacing {
    /// Pacing with the given delays.
    #[must_use]
    pub const fn new(between_timeframes: Duration, between_setups: Duration) -> Self {
        Self {
            between_timeframes,
            between_setups,
        }
    }

    /// No pauses at all.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Sleep between two timeframes.
    pub async fn pause_between_timeframes(&self) {
        pause(self.between_timeframes).await;
    }

    /// Sleep between two setups.
    pub async fn pause_between_setups(&self) {
        pause(self.between_setups).await;
    }
}

impl Default for CollectionPacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), Duration::from_millis(3000))
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
