//! Per-profile connection lifecycle.
//!
//! `Inactive → Activating → Active → Deactivating → Inactive`, with
//! `Active ⇄ ActiveError` driven by keep-alive and reconnect outcomes.
//! `ActiveError` means the profile is selected but the gateway is not
//! connected; selection and connectivity are reported separately.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a single profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not selected.
    Inactive,
    /// Selected, connect in flight.
    Activating,
    /// Selected and connected.
    Active,
    /// Selected but the last connect or keep-alive failed.
    ActiveError,
    /// Disconnect in flight.
    Deactivating,
}

impl LifecycleState {
    /// Whether the profile is selected as the live connection.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Activating | Self::Active | Self::ActiveError)
    }

    /// Check whether `self → to` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Inactive, Self::Activating)
                | (Self::Activating, Self::Active)
                | (Self::Activating, Self::ActiveError)
                | (Self::Active, Self::ActiveError)
                | (Self::ActiveError, Self::Active)
                // re-activating an already selected profile
                | (Self::Active | Self::ActiveError, Self::Activating)
                | (Self::Active | Self::ActiveError | Self::Activating, Self::Deactivating)
                | (Self::Deactivating, Self::Inactive)
        )
    }

    /// Validate a transition.
    pub fn transition_to(self, to: Self) -> Result<Self, LifecycleTransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(LifecycleTransitionError { from: self, to })
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inactive => "inactive",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::ActiveError => "active_error",
            Self::Deactivating => "deactivating",
        };
        f.write_str(s)
    }
}

/// Illegal lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid lifecycle transition: {from} -> {to}")]
pub struct LifecycleTransitionError {
    /// Current state.
    pub from: LifecycleState,
    /// Requested state.
    pub to: LifecycleState,
}
