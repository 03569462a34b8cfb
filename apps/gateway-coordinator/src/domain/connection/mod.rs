//! Connection Profile Bounded Context
//!
//! Persisted gateway connection profiles, their append-only event history,
//! and the per-profile lifecycle state machine.

mod client_ids;
mod history;
mod lifecycle;
mod profile;
mod repository;

pub use client_ids::{ClientIdAllocator, ClientIdLease};
pub use history::{ConnectionEventType, ConnectionHistoryEntry, NewHistoryEntry};
pub use lifecycle::{LifecycleState, LifecycleTransitionError};
pub use profile::{
    AccountMode, ConnectionKind, ConnectionProfile, NewProfile, ProfileUpdate,
    ProfileValidationError,
};
pub use repository::ProfileRepository;
