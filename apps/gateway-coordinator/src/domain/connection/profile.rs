//! Connection profile entity and its create/update commands.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::shared::ProfileId;

/// How the brokerage gateway is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Headless gateway process.
    Gateway,
    /// Full trader workstation.
    Tws,
}

impl ConnectionKind {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::Tws => "tws",
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionKind {
    type Err = ProfileValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "tws" => Ok(Self::Tws),
            other => Err(ProfileValidationError::new(
                "connection_type",
                format!("unknown connection type '{other}'"),
            )),
        }
    }
}

/// Trading account mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountMode {
    /// Real money.
    Live,
    /// Simulated account.
    Paper,
}

impl AccountMode {
    /// Wire/storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Paper => "paper",
        }
    }

    /// Check if this is live trading.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl fmt::Display for AccountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountMode {
    type Err = ProfileValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "paper" => Ok(Self::Paper),
            other => Err(ProfileValidationError::new(
                "account_mode",
                format!("unknown account mode '{other}'"),
            )),
        }
    }
}

/// A field failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for '{field}': {message}")]
pub struct ProfileValidationError {
    /// Offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub message: String,
}

impl ProfileValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A persisted, named set of gateway connection parameters.
///
/// Credentials are never stored here; the gateway process owns them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Row id.
    pub id: ProfileId,
    /// Unique profile name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Gateway or TWS.
    pub connection_kind: ConnectionKind,
    /// Live or paper.
    pub account_mode: AccountMode,
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Client identifier presented to the gateway.
    pub client_id: i32,
    /// Connect timeout in seconds.
    pub timeout_seconds: u32,
    /// Reconnect from the keep-alive loop when the connection drops.
    pub auto_reconnect: bool,
    /// Retry budget advertised for reconnects.
    pub max_retry_attempts: u32,
    /// Keep-alive cadence in minutes; zero disables keep-alive.
    pub keep_alive_interval_minutes: u32,
    /// Display timezone.
    pub timezone: String,
    /// Display date format.
    pub date_format: String,
    /// Display time format.
    pub time_format: String,
    /// Selected as the live connection. At most one profile is active.
    pub is_active: bool,
    /// Default profile. At most one profile is default.
    pub is_default: bool,
    /// Last successful connect.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Last connect/keep-alive error.
    pub last_error: Option<String>,
    /// Successful connects so far.
    pub connection_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl ConnectionProfile {
    /// Keep-alive cadence, or `None` when disabled.
    #[must_use]
    pub fn keep_alive_interval(&self) -> Option<Duration> {
        (self.keep_alive_interval_minutes > 0)
            .then(|| Duration::from_secs(u64::from(self.keep_alive_interval_minutes) * 60))
    }
}

/// Command to create a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    /// Unique profile name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Gateway or TWS.
    #[serde(default = "default_connection_kind")]
    pub connection_kind: ConnectionKind,
    /// Live or paper.
    #[serde(default = "default_account_mode")]
    pub account_mode: AccountMode,
    /// Gateway host.
    pub host: String,
    /// Gateway port (validated into 1..=65535).
    pub port: u32,
    /// Client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: i32,
    /// Connect timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    /// Reconnect from the keep-alive loop.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    /// Retry budget.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Keep-alive cadence in minutes (must be >= 0; 0 disables).
    #[serde(default = "default_keep_alive_minutes")]
    pub keep_alive_interval_minutes: i64,
    /// Display timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Display date format.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Display time format.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    /// Make this the default profile.
    #[serde(default)]
    pub is_default: bool,
}

const fn default_connection_kind() -> ConnectionKind {
    ConnectionKind::Gateway
}

const fn default_account_mode() -> AccountMode {
    AccountMode::Paper
}

const fn default_client_id() -> i32 {
    1
}

const fn default_timeout_seconds() -> u32 {
    30
}

const fn default_true() -> bool {
    true
}

const fn default_max_retry_attempts() -> u32 {
    3
}

const fn default_keep_alive_minutes() -> i64 {
    5
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_time_format() -> String {
    "%H:%M:%S".to_string()
}

impl NewProfile {
    /// Create a command with defaults for everything but name and endpoint.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            connection_kind: default_connection_kind(),
            account_mode: default_account_mode(),
            host: host.into(),
            port,
            client_id: default_client_id(),
            timeout_seconds: default_timeout_seconds(),
            auto_reconnect: true,
            max_retry_attempts: default_max_retry_attempts(),
            keep_alive_interval_minutes: default_keep_alive_minutes(),
            timezone: default_timezone(),
            date_format: default_date_format(),
            time_format: default_time_format(),
            is_default: false,
        }
    }

    /// Set the client identifier.
    #[must_use]
    pub const fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }

    /// Set the account mode.
    #[must_use]
    pub const fn with_account_mode(mut self, mode: AccountMode) -> Self {
        self.account_mode = mode;
        self
    }

    /// Set the keep-alive cadence.
    #[must_use]
    pub const fn with_keep_alive_minutes(mut self, minutes: i64) -> Self {
        self.keep_alive_interval_minutes = minutes;
        self
    }

    /// Enable or disable keep-alive reconnects.
    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Mark as the default profile.
    #[must_use]
    pub const fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Validate field ranges.
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        validate_name(&self.name)?;
        validate_host(&self.host)?;
        validate_port(self.port)?;
        validate_client_id(self.client_id)?;
        validate_timeout(self.timeout_seconds)?;
        validate_keep_alive(self.keep_alive_interval_minutes)?;
        Ok(())
    }

    /// Materialise the profile row. Call [`Self::validate`] first.
    #[must_use]
    pub fn into_profile(self, id: ProfileId, now: DateTime<Utc>) -> ConnectionProfile {
        ConnectionProfile {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            connection_kind: self.connection_kind,
            account_mode: self.account_mode,
            host: self.host.trim().to_string(),
            port: u16::try_from(self.port).unwrap_or(u16::MAX),
            client_id: self.client_id,
            timeout_seconds: self.timeout_seconds,
            auto_reconnect: self.auto_reconnect,
            max_retry_attempts: self.max_retry_attempts,
            keep_alive_interval_minutes: u32::try_from(self.keep_alive_interval_minutes)
                .unwrap_or(0),
            timezone: self.timezone,
            date_format: self.date_format,
            time_format: self.time_format,
            is_active: false,
            is_default: self.is_default,
            last_connected_at: None,
            last_error: None,
            connection_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a profile's configuration.
///
/// Activation, default and connection-outcome columns are owned by the
/// lifecycle manager and cannot be set through an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New connection kind.
    pub connection_kind: Option<ConnectionKind>,
    /// New account mode.
    pub account_mode: Option<AccountMode>,
    /// New host.
    pub host: Option<String>,
    /// New port.
    pub port: Option<u32>,
    /// New client id.
    pub client_id: Option<i32>,
    /// New connect timeout.
    pub timeout_seconds: Option<u32>,
    /// New auto-reconnect flag.
    pub auto_reconnect: Option<bool>,
    /// New retry budget.
    pub max_retry_attempts: Option<u32>,
    /// New keep-alive cadence.
    pub keep_alive_interval_minutes: Option<i64>,
    /// New timezone.
    pub timezone: Option<String>,
    /// New date format.
    pub date_format: Option<String>,
    /// New time format.
    pub time_format: Option<String>,
}

impl ProfileUpdate {
    /// Validate every field that is present.
    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(host) = &self.host {
            validate_host(host)?;
        }
        if let Some(port) = self.port {
            validate_port(port)?;
        }
        if let Some(client_id) = self.client_id {
            validate_client_id(client_id)?;
        }
        if let Some(timeout) = self.timeout_seconds {
            validate_timeout(timeout)?;
        }
        if let Some(minutes) = self.keep_alive_interval_minutes {
            validate_keep_alive(minutes)?;
        }
        Ok(())
    }

    /// Whether any field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.connection_kind.is_none()
            && self.account_mode.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.client_id.is_none()
            && self.timeout_seconds.is_none()
            && self.auto_reconnect.is_none()
            && self.max_retry_attempts.is_none()
            && self.keep_alive_interval_minutes.is_none()
            && self.timezone.is_none()
            && self.date_format.is_none()
            && self.time_format.is_none()
    }

    /// Apply to a profile. Call [`Self::validate`] first.
    pub fn apply(&self, profile: &mut ConnectionProfile, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            profile.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            profile.description = Some(description.clone());
        }
        if let Some(kind) = self.connection_kind {
            profile.connection_kind = kind;
        }
        if let Some(mode) = self.account_mode {
            profile.account_mode = mode;
        }
        if let Some(host) = &self.host {
            profile.host = host.trim().to_string();
        }
        if let Some(port) = self.port.and_then(|p| u16::try_from(p).ok()) {
            profile.port = port;
        }
        if let Some(client_id) = self.client_id {
            profile.client_id = client_id;
        }
        if let Some(timeout) = self.timeout_seconds {
            profile.timeout_seconds = timeout;
        }
        if let Some(auto_reconnect) = self.auto_reconnect {
            profile.auto_reconnect = auto_reconnect;
        }
        if let Some(max_retry) = self.max_retry_attempts {
            profile.max_retry_attempts = max_retry;
        }
        if let Some(minutes) = self
            .keep_alive_interval_minutes
            .and_then(|m| u32::try_from(m).ok())
        {
            profile.keep_alive_interval_minutes = minutes;
        }
        if let Some(timezone) = &self.timezone {
            profile.timezone = timezone.clone();
        }
        if let Some(date_format) = &self.date_format {
            profile.date_format = date_format.clone();
        }
        if let Some(time_format) = &self.time_format {
            profile.time_format = time_format.clone();
        }
        profile.updated_at = now;
    }
}

fn validate_name(name: &str) -> Result<(), ProfileValidationError> {
    if name.trim().is_empty() {
        return Err(ProfileValidationError::new("name", "must not be empty"));
    }
    Ok(())
}

fn validate_host(host: &str) -> Result<(), ProfileValidationError> {
    if host.trim().is_empty() {
        return Err(ProfileValidationError::new("host", "must not be empty"));
    }
    Ok(())
}

/// Validate a gateway port.
pub(crate) fn validate_port(port: u32) -> Result<(), ProfileValidationError> {
    if !(1..=65_535).contains(&port) {
        return Err(ProfileValidationError::new(
            "port",
            format!("{port} is outside 1..=65535"),
        ));
    }
    Ok(())
}

fn validate_client_id(client_id: i32) -> Result<(), ProfileValidationError> {
    if client_id < 0 {
        return Err(ProfileValidationError::new(
            "client_id",
            "must not be negative",
        ));
    }
    Ok(())
}

fn validate_timeout(timeout_seconds: u32) -> Result<(), ProfileValidationError> {
    if timeout_seconds == 0 {
        return Err(ProfileValidationError::new(
            "timeout_seconds",
            "must be positive",
        ));
    }
    Ok(())
}

fn validate_keep_alive(minutes: i64) -> Result<(), ProfileValidationError> {
    if minutes < 0 {
        return Err(ProfileValidationError::new(
            "keep_alive_interval_minutes",
            "must not be negative",
        ));
    }
    if u32::try_from(minutes).is_err() {
        return Err(ProfileValidationError::new(
            "keep_alive_interval_minutes",
            "is too large",
        ));
    }
    Ok(())
}
