//! In-memory profile repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::connection::{
    ConnectionHistoryEntry, ConnectionProfile, NewHistoryEntry, NewProfile, ProfileRepository,
    ProfileUpdate,
};
use crate::domain::shared::{ProfileId, RepositoryError};

const ENTITY: &str = "ConnectionProfile";

#[derive(Debug, Default)]
struct State {
    profiles: BTreeMap<ProfileId, ConnectionProfile>,
    history: Vec<ConnectionHistoryEntry>,
    next_profile_id: i64,
    next_history_id: i64,
}

impl State {
    fn get_mut(&mut self, id: ProfileId) -> Result<&mut ConnectionProfile, RepositoryError> {
        self.profiles
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))
    }

    fn name_taken(&self, name: &str, except: Option<ProfileId>) -> bool {
        self.profiles
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
    }
}

/// In-memory implementation of `ProfileRepository`.
///
/// A single lock guards profiles and history, so every method is atomic and
/// both "at most one" invariants hold after each call. The first profile
/// created becomes the default.
#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    state: Mutex<State>,
}

impl InMemoryProfileRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().profiles.len()
    }

    /// Whether no profile is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().profiles.is_empty()
    }

    /// Total history entries across every profile.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn create(&self, profile: NewProfile) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        let name = profile.name.trim();
        if state.name_taken(name, None) {
            return Err(RepositoryError::conflict(format!(
                "profile name '{name}' already exists"
            )));
        }

        state.next_profile_id += 1;
        let id = ProfileId::new(state.next_profile_id);
        let mut created = profile.into_profile(id, Utc::now());
        if state.profiles.is_empty() {
            created.is_default = true;
        }
        if created.is_default {
            for other in state.profiles.values_mut() {
                other.is_default = false;
            }
        }
        state.profiles.insert(id, created.clone());
        Ok(created)
    }

    async fn find(&self, id: ProfileId) -> Result<Option<ConnectionProfile>, RepositoryError> {
        Ok(self.state.lock().profiles.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ConnectionProfile>, RepositoryError> {
        let name = name.trim();
        Ok(self
            .state
            .lock()
            .profiles
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ConnectionProfile>, RepositoryError> {
        Ok(self.state.lock().profiles.values().cloned().collect())
    }

    async fn update(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        if !state.profiles.contains_key(&id) {
            return Err(RepositoryError::not_found(ENTITY, id));
        }
        if let Some(name) = &update.name
            && state.name_taken(name.trim(), Some(id))
        {
            return Err(RepositoryError::conflict(format!(
                "profile name '{}' already exists",
                name.trim()
            )));
        }
        let profile = state.get_mut(id)?;
        update.apply(profile, Utc::now());
        Ok(profile.clone())
    }

    async fn delete(&self, id: ProfileId) -> Result<(), RepositoryError> {
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .get(&id)
            .ok_or_else(|| RepositoryError::not_found(ENTITY, id))?;
        if profile.is_default {
            return Err(RepositoryError::conflict(format!(
                "profile {id} is the default and cannot be deleted"
            )));
        }
        state.profiles.remove(&id);
        state.history.retain(|entry| entry.profile_id != id);
        Ok(())
    }

    async fn activate_exclusive(
        &self,
        id: ProfileId,
    ) -> Result<(ConnectionProfile, Vec<ProfileId>), RepositoryError> {
        let mut state = self.state.lock();
        if !state.profiles.contains_key(&id) {
            return Err(RepositoryError::not_found(ENTITY, id));
        }
        let now = Utc::now();
        let mut deactivated = Vec::new();
        for other in state.profiles.values_mut().filter(|p| p.id != id && p.is_active) {
            other.is_active = false;
            other.updated_at = now;
            deactivated.push(other.id);
        }
        let profile = state.get_mut(id)?;
        profile.is_active = true;
        profile.updated_at = now;
        Ok((profile.clone(), deactivated))
    }

    async fn set_inactive(&self, id: ProfileId) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        let profile = state.get_mut(id)?;
        profile.is_active = false;
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn set_default_exclusive(
        &self,
        id: ProfileId,
    ) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        if !state.profiles.contains_key(&id) {
            return Err(RepositoryError::not_found(ENTITY, id));
        }
        let now = Utc::now();
        for other in state.profiles.values_mut().filter(|p| p.id != id && p.is_default) {
            other.is_default = false;
            other.updated_at = now;
        }
        let profile = state.get_mut(id)?;
        profile.is_default = true;
        profile.updated_at = now;
        Ok(profile.clone())
    }

    async fn find_active(&self) -> Result<Option<ConnectionProfile>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .profiles
            .values()
            .find(|p| p.is_active)
            .cloned())
    }

    async fn find_default(&self) -> Result<Option<ConnectionProfile>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .profiles
            .values()
            .find(|p| p.is_default)
            .cloned())
    }

    async fn record_connected(
        &self,
        id: ProfileId,
        at: DateTime<Utc>,
    ) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        let profile = state.get_mut(id)?;
        profile.last_connected_at = Some(at);
        profile.last_error = None;
        profile.connection_count += 1;
        profile.updated_at = at;
        Ok(profile.clone())
    }

    async fn record_error(
        &self,
        id: ProfileId,
        message: &str,
    ) -> Result<ConnectionProfile, RepositoryError> {
        let mut state = self.state.lock();
        let profile = state.get_mut(id)?;
        profile.last_error = Some(message.to_string());
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn append_history(
        &self,
        entry: NewHistoryEntry,
    ) -> Result<ConnectionHistoryEntry, RepositoryError> {
        let mut state = self.state.lock();
        if !state.profiles.contains_key(&entry.profile_id) {
            return Err(RepositoryError::not_found(ENTITY, entry.profile_id));
        }
        state.next_history_id += 1;
        let stored = entry.into_entry(state.next_history_id, Utc::now());
        state.history.push(stored.clone());
        Ok(stored)
    }

    async fn history(
        &self,
        profile_id: ProfileId,
        limit: Option<usize>,
    ) -> Result<Vec<ConnectionHistoryEntry>, RepositoryError> {
        let state = self.state.lock();
        // appended in time order, so reverse insertion order is newest first
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|entry| entry.profile_id == profile_id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn clear_history(&self, profile_id: ProfileId) -> Result<usize, RepositoryError> {
        let mut state = self.state.lock();
        let before = state.history.len();
        state.history.retain(|entry| entry.profile_id != profile_id);
        Ok(before - state.history.len())
    }
}
