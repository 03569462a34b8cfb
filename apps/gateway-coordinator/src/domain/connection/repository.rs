//! Profile Repository Trait
//!
//! Persistence abstraction for connection profiles and their history.
//! Implemented by adapters in the infrastructure layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::history::{ConnectionHistoryEntry, NewHistoryEntry};
use super::profile::{ConnectionProfile, NewProfile, ProfileUpdate};
use crate::domain::shared::{ProfileId, RepositoryError};

/// Repository for connection profiles.
///
/// Implementations must guarantee that at most one profile is active and at
/// most one is default after every call. Each mutating method is a single
/// atomic unit.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a profile.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is taken.
    async fn create(&self, profile: NewProfile) -> Result<ConnectionProfile, RepositoryError>;

    /// Find a profile by id.
    async fn find(&self, id: ProfileId) -> Result<Option<ConnectionProfile>, RepositoryError>;

    /// Find a profile by its unique name.
    async fn find_by_name(&self, name: &str)
    -> Result<Option<ConnectionProfile>, RepositoryError>;

    /// List all profiles ordered by id.
    async fn list(&self) -> Result<Vec<ConnectionProfile>, RepositoryError>;

    /// Apply a configuration update.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, `Conflict` on a duplicate name.
    async fn update(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<ConnectionProfile, RepositoryError>;

    /// Delete a profile and cascade its history.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the profile is the default.
    async fn delete(&self, id: ProfileId) -> Result<(), RepositoryError>;

    /// Deactivate every profile and activate `id`, as one transaction.
    ///
    /// Returns the activated profile and the ids that were deactivated.
    async fn activate_exclusive(
        &self,
        id: ProfileId,
    ) -> Result<(ConnectionProfile, Vec<ProfileId>), RepositoryError>;

    /// Mark a profile inactive.
    async fn set_inactive(&self, id: ProfileId) -> Result<ConnectionProfile, RepositoryError>;

    /// Clear the default flag everywhere and set it on `id`, as one transaction.
    async fn set_default_exclusive(
        &self,
        id: ProfileId,
    ) -> Result<ConnectionProfile, RepositoryError>;

    /// The active profile, if any.
    async fn find_active(&self) -> Result<Option<ConnectionProfile>, RepositoryError>;

    /// The default profile, if any.
    async fn find_default(&self) -> Result<Option<ConnectionProfile>, RepositoryError>;

    /// Record a successful connect: set `last_connected_at`, clear
    /// `last_error`, increment `connection_count`.
    async fn record_connected(
        &self,
        id: ProfileId,
        at: DateTime<Utc>,
    ) -> Result<ConnectionProfile, RepositoryError>;

    /// Store the latest connection error.
    async fn record_error(
        &self,
        id: ProfileId,
        message: &str,
    ) -> Result<ConnectionProfile, RepositoryError>;

    /// Append a history entry.
    async fn append_history(
        &self,
        entry: NewHistoryEntry,
    ) -> Result<ConnectionHistoryEntry, RepositoryError>;

    /// History for a profile, newest first.
    async fn history(
        &self,
        profile_id: ProfileId,
        limit: Option<usize>,
    ) -> Result<Vec<ConnectionHistoryEntry>, RepositoryError>;

    /// Delete a profile's history, returning the number of rows removed.
    async fn clear_history(&self, profile_id: ProfileId) -> Result<usize, RepositoryError>;
}
