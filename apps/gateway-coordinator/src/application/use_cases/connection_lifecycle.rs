//! Connection Lifecycle Use Case
//!
//! Owns profile activation state. At most one profile is active; activation,
//! deactivation, deletion and keep-alive all run under one lifecycle lock so
//! the invariant and "one reconnect in flight" hold under concurrent calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BrokerGateway, BrokerType, ConnectionStatus, ConnectionTestResult, GatewayConnectionConfig,
};
use crate::application::services::BrokerGatewayFactory;
use crate::domain::connection::{
    ClientIdAllocator, ConnectionEventType, ConnectionHistoryEntry, ConnectionProfile,
    LifecycleState, NewHistoryEntry, NewProfile, ProfileRepository, ProfileUpdate,
};
use crate::domain::shared::{ProfileId, RepositoryError};
use crate::error::{CoreError, ErrorPayload};

/// Default distance between a profile's client id and its test client id.
pub const DEFAULT_TEST_CLIENT_ID_OFFSET: i32 = 1000;

/// Result of [`ConnectionLifecycleManager::activate_profile`].
///
/// Activation selects the profile even when the connect fails; `connected`
/// and `error` report live connectivity separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationOutcome {
    /// Profile after activation.
    pub profile: ConnectionProfile,
    /// Lifecycle state after activation.
    pub state: LifecycleState,
    /// Whether the gateway connect succeeded.
    pub connected: bool,
    /// Status returned by the gateway.
    pub status: ConnectionStatus,
    /// Connect failure, if any.
    pub error: Option<ErrorPayload>,
    /// Profiles deactivated to make room.
    pub superseded: Vec<ProfileId>,
}

/// What a connection test targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionTestTarget {
    /// A stored profile.
    Profile(ProfileId),
    /// Parameters that are not stored.
    AdHoc(GatewayConnectionConfig),
}

/// Result of a connection test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestConnectionOutcome {
    /// Client id the test ran with.
    pub client_id: i32,
    /// Wall time of the test call.
    pub duration_ms: u64,
    /// Gateway result; a gateway error becomes `success: false`.
    pub result: ConnectionTestResult,
}

/// Selection and connectivity, reported separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionOverview {
    /// Selected profile, if any.
    pub active_profile: Option<ConnectionProfile>,
    /// Its lifecycle state.
    pub state: Option<LifecycleState>,
    /// Live gateway status.
    pub status: ConnectionStatus,
}

/// Result of one keep-alive run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KeepAliveOutcome {
    /// Active profile has keep-alive disabled.
    Disabled,
    /// No profile is active.
    NoActiveProfile,
    /// Another keep-alive is running.
    Skipped,
    /// Connection is up.
    Healthy,
    /// Connection is down and auto-reconnect is off.
    DisconnectedNoReconnect,
    /// Connection was down and the reconnect succeeded.
    Reconnected,
    /// Connection was down and the reconnect failed.
    ReconnectFailed {
        /// Reconnect error.
        error: String,
    },
}

/// Timer parameters for [`ConnectionLifecycleManager::spawn_keep_alive_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAliveSchedule {
    /// Shortest allowed tick.
    pub floor: Duration,
    /// Tick used while no profile has keep-alive enabled.
    pub idle_poll: Duration,
}

impl Default for KeepAliveSchedule {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(30),
            idle_poll: Duration::from_secs(60),
        }
    }
}

/// Clears the keep-alive in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Use case owning profile selection and the live gateway connection.
pub struct ConnectionLifecycleManager<P>
where
    P: ProfileRepository,
{
    profiles: Arc<P>,
    factory: Arc<BrokerGatewayFactory>,
    broker: BrokerType,
    lifecycle_lock: Mutex<()>,
    keep_alive_in_flight: AtomicBool,
    states: RwLock<HashMap<ProfileId, LifecycleState>>,
    client_ids: ClientIdAllocator,
    test_client_id_offset: i32,
}

impl<P> ConnectionLifecycleManager<P>
where
    P: ProfileRepository,
{
    /// Create a manager driving the given broker's gateway.
    pub fn new(profiles: Arc<P>, factory: Arc<BrokerGatewayFactory>, broker: BrokerType) -> Self {
        Self {
            profiles,
            factory,
            broker,
            lifecycle_lock: Mutex::new(()),
            keep_alive_in_flight: AtomicBool::new(false),
            states: RwLock::new(HashMap::new()),
            client_ids: ClientIdAllocator::new(),
            test_client_id_offset: DEFAULT_TEST_CLIENT_ID_OFFSET,
        }
    }

    /// Override the test client id offset.
    #[must_use]
    pub const fn with_test_client_id_offset(mut self, offset: i32) -> Self {
        self.test_client_id_offset = offset;
        self
    }

    /// Broker this manager drives.
    pub const fn broker(&self) -> BrokerType {
        self.broker
    }

    // ============================================
    // Profile CRUD
    // ============================================

    /// Create a profile.
    pub async fn create_profile(&self, new: NewProfile) -> Result<ConnectionProfile, CoreError> {
        new.validate()?;
        let profile = self.profiles.create(new).await?;
        tracing::info!(profile_id = %profile.id, name = %profile.name, "Connection profile created");
        Ok(profile)
    }

    /// Fetch a profile.
    pub async fn get_profile(&self, id: ProfileId) -> Result<ConnectionProfile, CoreError> {
        self.load(id).await
    }

    /// Every profile.
    pub async fn list_profiles(&self) -> Result<Vec<ConnectionProfile>, CoreError> {
        Ok(self.profiles.list().await?)
    }

    /// Update a profile's configuration.
    pub async fn update_profile(
        &self,
        id: ProfileId,
        update: ProfileUpdate,
    ) -> Result<ConnectionProfile, CoreError> {
        update.validate()?;
        if update.is_empty() {
            return self.load(id).await;
        }
        let profile = self.profiles.update(id, &update).await?;
        tracing::info!(profile_id = %id, "Connection profile updated");
        Ok(profile)
    }

    /// Delete a profile, deactivating it first if it is active.
    ///
    /// # Errors
    ///
    /// `Conflict` if the profile is the default; the store is left untouched.
    pub async fn delete_profile(&self, id: ProfileId) -> Result<(), CoreError> {
        let _lifecycle = self.lifecycle_lock.lock().await;
        let profile = self.load(id).await?;
        if profile.is_default {
            return Err(CoreError::Conflict {
                message: format!("profile {id} is the default and cannot be deleted"),
            });
        }
        if profile.is_active {
            self.deactivate_locked(profile).await?;
        }
        self.profiles.delete(id).await?;
        self.states.write().remove(&id);
        tracing::info!(profile_id = %id, "Connection profile deleted");
        Ok(())
    }

    /// Make a profile the default.
    pub async fn set_default_profile(&self, id: ProfileId) -> Result<ConnectionProfile, CoreError> {
        let profile = self.profiles.set_default_exclusive(id).await?;
        tracing::info!(profile_id = %id, "Default connection profile changed");
        Ok(profile)
    }

    // ============================================
    // Activation
    // ============================================

    /// Select a profile and connect the gateway with it.
    ///
    /// Every other profile is deactivated first. A failed connect leaves the
    /// profile selected in `ActiveError` and is reported in the outcome, not
    /// as an error.
    pub async fn activate_profile(&self, id: ProfileId) -> Result<ActivationOutcome, CoreError> {
        let _lifecycle = self.lifecycle_lock.lock().await;
        let profile = self.load(id).await?;
        let gateway = self.gateway()?;

        self.transition(&profile, LifecycleState::Activating)?;
        let (profile, superseded) =
            self.forget_on_error(id, self.profiles.activate_exclusive(id).await)?;

        for other in superseded.iter().copied().filter(|other| *other != id) {
            self.states.write().insert(other, LifecycleState::Inactive);
            self.append(
                NewHistoryEntry::new(other, ConnectionEventType::Disconnect).with_details(json!({
                    "reason": "superseded",
                    "activated_profile_id": id,
                })),
            )
            .await;
            tracing::info!(profile_id = %other, activated = %id, "Profile deactivated by activation");
        }

        let config = GatewayConnectionConfig::from_profile(&profile);
        self.append(
            NewHistoryEntry::new(id, ConnectionEventType::ConnectAttempt)
                .with_details(connection_details(&config)),
        )
        .await;

        let started = Instant::now();
        let result = gateway.connect(&config).await;
        let duration_ms = elapsed_ms(started);

        match result {
            Ok(status) if status.connected => {
                let profile =
                    self.forget_on_error(id, self.profiles.record_connected(id, Utc::now()).await)?;
                self.append(
                    NewHistoryEntry::new(id, ConnectionEventType::ConnectSuccess)
                        .with_details(connection_details(&config))
                        .with_duration_ms(duration_ms),
                )
                .await;
                let state = self.transition(&profile, LifecycleState::Active)?;
                tracing::info!(profile_id = %id, duration_ms, "Profile activated and connected");
                Ok(ActivationOutcome {
                    profile,
                    state,
                    connected: true,
                    status,
                    error: None,
                    superseded,
                })
            }
            other => {
                let (status, error) = match other {
                    Ok(status) => {
                        let message = status
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "gateway reported not connected".to_string());
                        let error = CoreError::Connection {
                            message: format!("connect: {message}"),
                            detail: json!({ "code": "CONNECTION_ERROR", "message": message }),
                        };
                        (status, error)
                    }
                    Err(e) => (
                        ConnectionStatus::failed(e.to_string()),
                        CoreError::connection("connect", &e),
                    ),
                };
                let message = error.to_string();
                let profile =
                    self.forget_on_error(id, self.profiles.record_error(id, &message).await)?;
                self.append(
                    NewHistoryEntry::new(id, ConnectionEventType::ConnectFailure)
                        .with_details(connection_details(&config))
                        .with_error(&message, error.code())
                        .with_duration_ms(duration_ms),
                )
                .await;
                let state = self.transition(&profile, LifecycleState::ActiveError)?;
                tracing::warn!(profile_id = %id, error = %message, "Profile activated but connect failed");
                Ok(ActivationOutcome {
                    profile,
                    state,
                    connected: false,
                    status,
                    error: Some(error.to_payload()),
                    superseded,
                })
            }
        }
    }

    /// Deselect a profile and disconnect the gateway.
    ///
    /// Gateway-side disconnect failures are logged; the profile is marked
    /// inactive regardless. Deactivating an inactive profile is a no-op.
    pub async fn deactivate_profile(&self, id: ProfileId) -> Result<ConnectionProfile, CoreError> {
        let _lifecycle = self.lifecycle_lock.lock().await;
        let profile = self.load(id).await?;
        if !profile.is_active {
            return Ok(profile);
        }
        self.deactivate_locked(profile).await
    }

    async fn deactivate_locked(
        &self,
        profile: ConnectionProfile,
    ) -> Result<ConnectionProfile, CoreError> {
        let id = profile.id;
        self.transition(&profile, LifecycleState::Deactivating)?;
        let updated = self.forget_on_error(id, self.profiles.set_inactive(id).await)?;
        self.append(
            NewHistoryEntry::new(id, ConnectionEventType::Disconnect)
                .with_details(json!({ "reason": "deactivated" })),
        )
        .await;

        match self.gateway() {
            Ok(gateway) => {
                if let Err(e) = gateway.disconnect().await {
                    tracing::warn!(profile_id = %id, error = %e, "Gateway disconnect failed during deactivation");
                }
            }
            Err(e) => {
                tracing::warn!(profile_id = %id, error = %e, "No gateway available for disconnect");
            }
        }

        self.transition(&updated, LifecycleState::Inactive)?;
        tracing::info!(profile_id = %id, "Profile deactivated");
        Ok(updated)
    }

    // ============================================
    // Status, tests and keep-alive
    // ============================================

    /// Lifecycle state of a profile.
    pub async fn lifecycle_state(&self, id: ProfileId) -> Result<LifecycleState, CoreError> {
        let profile = self.load(id).await?;
        Ok(self.current_state(&profile))
    }

    /// Selected profile and live gateway status.
    ///
    /// A failing status call is reported as disconnected.
    pub async fn connection_status(&self) -> Result<ConnectionOverview, CoreError> {
        let active = self.profiles.find_active().await?;
        let gateway = self.gateway()?;
        let status = gateway
            .connection_status()
            .await
            .unwrap_or_else(|e| ConnectionStatus::failed(e.to_string()));
        let state = active.as_ref().map(|p| self.current_state(p));
        Ok(ConnectionOverview {
            active_profile: active,
            state,
            status,
        })
    }

    /// Test connectivity without touching persisted state.
    ///
    /// Runs with `client_id + offset`, bumped past any id already used by a
    /// concurrent test.
    pub async fn test_connection(
        &self,
        target: ConnectionTestTarget,
    ) -> Result<TestConnectionOutcome, CoreError> {
        let config = match target {
            ConnectionTestTarget::Profile(id) => {
                GatewayConnectionConfig::from_profile(&self.load(id).await?)
            }
            ConnectionTestTarget::AdHoc(config) => {
                if config.host.trim().is_empty() {
                    return Err(CoreError::validation("host", "must not be empty"));
                }
                if config.port == 0 {
                    return Err(CoreError::validation("port", "0 is outside 1..=65535"));
                }
                config
            }
        };

        let base = config
            .client_id
            .checked_add(self.test_client_id_offset)
            .ok_or_else(|| CoreError::validation("client_id", "test client id overflows"))?;
        let lease = self
            .client_ids
            .lease_from(base)
            .ok_or_else(|| CoreError::Conflict {
                message: "no free test client id".to_string(),
            })?;
        let config = config.with_client_id(lease.id());
        let gateway = self.gateway()?;

        let started = Instant::now();
        let result = match gateway.test_connection(&config).await {
            Ok(result) => result,
            Err(e) => ConnectionTestResult {
                success: false,
                message: e.to_string(),
                details: e.detail(),
            },
        };
        let duration_ms = elapsed_ms(started);
        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = lease.id(),
            success = result.success,
            duration_ms,
            "Connection test finished"
        );

        Ok(TestConnectionOutcome {
            client_id: lease.id(),
            duration_ms,
            result,
        })
    }

    /// Check the active connection and reconnect if allowed.
    ///
    /// Meant to be driven by a timer. A call made while another is still
    /// running returns [`KeepAliveOutcome::Skipped`].
    pub async fn perform_keep_alive(&self) -> Result<KeepAliveOutcome, CoreError> {
        let Some(_in_flight) = InFlight::acquire(&self.keep_alive_in_flight) else {
            tracing::debug!("Keep-alive already in flight, skipping");
            return Ok(KeepAliveOutcome::Skipped);
        };
        let _lifecycle = self.lifecycle_lock.lock().await;

        let Some(profile) = self.profiles.find_active().await? else {
            return Ok(KeepAliveOutcome::NoActiveProfile);
        };
        if profile.keep_alive_interval().is_none() {
            return Ok(KeepAliveOutcome::Disabled);
        }
        let id = profile.id;
        let gateway = self.gateway()?;

        let status = gateway
            .connection_status()
            .await
            .unwrap_or_else(|e| ConnectionStatus::failed(e.to_string()));

        if status.connected {
            self.append(
                NewHistoryEntry::new(id, ConnectionEventType::KeepAlive)
                    .with_details(json!({ "connected": true })),
            )
            .await;
            if self.current_state(&profile) == LifecycleState::ActiveError {
                self.transition(&profile, LifecycleState::Active)?;
            }
            tracing::debug!(profile_id = %id, "Keep-alive healthy");
            return Ok(KeepAliveOutcome::Healthy);
        }

        if !profile.auto_reconnect {
            self.append(
                NewHistoryEntry::new(id, ConnectionEventType::KeepAlive).with_details(json!({
                    "connected": false,
                    "auto_reconnect": false,
                    "last_error": status.last_error,
                })),
            )
            .await;
            self.mark_error(&profile)?;
            tracing::warn!(profile_id = %id, "Keep-alive found connection down; auto-reconnect disabled");
            return Ok(KeepAliveOutcome::DisconnectedNoReconnect);
        }

        self.append(
            NewHistoryEntry::new(id, ConnectionEventType::KeepAliveReconnect)
                .with_details(json!({ "last_error": status.last_error })),
        )
        .await;
        self.mark_error(&profile)?;

        let config = GatewayConnectionConfig::from_profile(&profile);
        let started = Instant::now();
        let result = gateway.connect(&config).await;
        let duration_ms = elapsed_ms(started);

        match result {
            Ok(status) if status.connected => {
                let profile = self.profiles.record_connected(id, Utc::now()).await?;
                self.append(
                    NewHistoryEntry::new(id, ConnectionEventType::Reconnect)
                        .with_details(connection_details(&config))
                        .with_duration_ms(duration_ms),
                )
                .await;
                self.transition(&profile, LifecycleState::Active)?;
                tracing::info!(profile_id = %id, duration_ms, "Keep-alive reconnect succeeded");
                Ok(KeepAliveOutcome::Reconnected)
            }
            other => {
                let error = match other {
                    Ok(status) => CoreError::Connection {
                        message: format!(
                            "reconnect: {}",
                            status
                                .last_error
                                .unwrap_or_else(|| "gateway reported not connected".to_string())
                        ),
                        detail: Value::Null,
                    },
                    Err(e) => CoreError::connection("reconnect", &e),
                };
                let message = error.to_string();
                self.profiles.record_error(id, &message).await?;
                let mut details = connection_details(&config);
                details["trigger"] = json!("keep_alive");
                self.append(
                    NewHistoryEntry::new(id, ConnectionEventType::ConnectFailure)
                        .with_details(details)
                        .with_error(&message, error.code())
                        .with_duration_ms(duration_ms),
                )
                .await;
                tracing::warn!(profile_id = %id, error = %message, "Keep-alive reconnect failed");
                Ok(KeepAliveOutcome::ReconnectFailed { error: message })
            }
        }
    }

    /// History for a profile, newest first.
    pub async fn connection_history(
        &self,
        id: ProfileId,
        limit: Option<usize>,
    ) -> Result<Vec<ConnectionHistoryEntry>, CoreError> {
        self.load(id).await?;
        Ok(self.profiles.history(id, limit).await?)
    }

    /// Delete a profile's history. Returns the number of entries removed.
    pub async fn clear_connection_history(&self, id: ProfileId) -> Result<usize, CoreError> {
        self.load(id).await?;
        let removed = self.profiles.clear_history(id).await?;
        tracing::info!(profile_id = %id, removed, "Connection history cleared");
        Ok(removed)
    }

    /// Tick length for the keep-alive timer: the active profile's interval,
    /// or the idle poll when keep-alive is off, never below the floor.
    pub async fn next_keep_alive_interval(&self, schedule: KeepAliveSchedule) -> Duration {
        let interval = match self.profiles.find_active().await {
            Ok(Some(profile)) => profile.keep_alive_interval(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read active profile for keep-alive");
                None
            }
        };
        interval.unwrap_or(schedule.idle_poll).max(schedule.floor)
    }

    // ============================================
    // Internals
    // ============================================

    async fn load(&self, id: ProfileId) -> Result<ConnectionProfile, CoreError> {
        self.profiles
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found("ConnectionProfile", id))
    }

    fn gateway(&self) -> Result<Arc<dyn BrokerGateway>, CoreError> {
        self.factory
            .get(self.broker)
            .map_err(|e| CoreError::connection("resolve gateway", &e))
    }

    fn current_state(&self, profile: &ConnectionProfile) -> LifecycleState {
        self.states
            .read()
            .get(&profile.id)
            .copied()
            .unwrap_or(if profile.is_active {
                LifecycleState::Active
            } else {
                LifecycleState::Inactive
            })
    }

    fn transition(
        &self,
        profile: &ConnectionProfile,
        to: LifecycleState,
    ) -> Result<LifecycleState, CoreError> {
        let from = self.current_state(profile);
        let state = from.transition_to(to).map_err(|e| CoreError::Internal {
            message: e.to_string(),
        })?;
        self.states.write().insert(profile.id, state);
        tracing::debug!(profile_id = %profile.id, from = %from, to = %state, "Lifecycle transition");
        Ok(state)
    }

    /// Drop the cached state when a store write fails mid-transition, so the
    /// next call derives it from the persisted `is_active` flag.
    fn forget_on_error<T>(
        &self,
        id: ProfileId,
        result: Result<T, RepositoryError>,
    ) -> Result<T, CoreError> {
        result.map_err(|e| {
            self.states.write().remove(&id);
            e.into()
        })
    }

    fn mark_error(&self, profile: &ConnectionProfile) -> Result<(), CoreError> {
        if self.current_state(profile) == LifecycleState::Active {
            self.transition(profile, LifecycleState::ActiveError)?;
        }
        Ok(())
    }

    async fn append(&self, entry: NewHistoryEntry) {
        let profile_id = entry.profile_id;
        let event = entry.event_type;
        if let Err(e) = self.profiles.append_history(entry).await {
            tracing::error!(profile_id = %profile_id, event = %event, error = %e, "Failed to append connection history");
        }
    }
}

impl<P> ConnectionLifecycleManager<P>
where
    P: ProfileRepository + 'static,
{
    /// Drive [`Self::perform_keep_alive`] on a timer until `shutdown` fires.
    ///
    /// The tick is re-read from the active profile before every sleep.
    pub fn spawn_keep_alive_loop(
        manager: Arc<Self>,
        schedule: KeepAliveSchedule,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let interval = manager.next_keep_alive_interval(schedule).await;
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                match manager.perform_keep_alive().await {
                    Ok(outcome) => tracing::debug!(?outcome, "Keep-alive tick"),
                    Err(e) => tracing::warn!(error = %e, "Keep-alive tick failed"),
                }
            }
            tracing::info!("Keep-alive loop stopped");
        })
    }
}

fn connection_details(config: &GatewayConnectionConfig) -> Value {
    json!({
        "host": config.host,
        "port": config.port,
        "client_id": config.client_id,
        "connection_type": config.connection_kind,
        "account_mode": config.account_mode,
        "timeout_seconds": config.timeout_seconds,
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
