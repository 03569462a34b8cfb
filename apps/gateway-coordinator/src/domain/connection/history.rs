//! Append-only connection event history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::shared::ProfileId;

/// Kind of connection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionEventType {
    /// Connect issued during activation.
    ConnectAttempt,
    /// Connect succeeded.
    ConnectSuccess,
    /// Connect failed.
    ConnectFailure,
    /// Profile deactivated.
    Disconnect,
    /// Keep-alive reconnect succeeded.
    Reconnect,
    /// A remote call timed out.
    Timeout,
    /// Unclassified error.
    Error,
    /// Keep-alive check ran.
    KeepAlive,
    /// Keep-alive found the connection down and is reconnecting.
    KeepAliveReconnect,
}

impl ConnectionEventType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectAttempt => "connect_attempt",
            Self::ConnectSuccess => "connect_success",
            Self::ConnectFailure => "connect_failure",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::KeepAlive => "keep_alive",
            Self::KeepAliveReconnect => "keep_alive_reconnect",
        }
    }
}

impl fmt::Display for ConnectionEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of a connection event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHistoryEntry {
    /// Row id.
    pub id: i64,
    /// Owning profile (cascade-deleted with it).
    pub profile_id: ProfileId,
    /// Event kind.
    pub event_type: ConnectionEventType,
    /// Structured event detail.
    pub details: Value,
    /// Error message, if the event represents a failure.
    pub error_message: Option<String>,
    /// Machine-readable error code.
    pub error_code: Option<String>,
    /// When the event happened.
    pub event_timestamp: DateTime<Utc>,
    /// Duration of the remote call, when one was made.
    pub duration_ms: Option<u64>,
}

/// History entry waiting to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    /// Owning profile.
    pub profile_id: ProfileId,
    /// Event kind.
    pub event_type: ConnectionEventType,
    /// Structured event detail.
    pub details: Value,
    /// Error message.
    pub error_message: Option<String>,
    /// Error code.
    pub error_code: Option<String>,
    /// Remote call duration.
    pub duration_ms: Option<u64>,
}

impl NewHistoryEntry {
    /// Start an entry with empty details.
    #[must_use]
    pub fn new(profile_id: ProfileId, event_type: ConnectionEventType) -> Self {
        Self {
            profile_id,
            event_type,
            details: Value::Object(serde_json::Map::new()),
            error_message: None,
            error_code: None,
            duration_ms: None,
        }
    }

    /// Attach structured detail.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Attach an error message and code.
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>, code: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self.error_code = Some(code.into());
        self
    }

    /// Attach a call duration.
    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Materialise the stored row.
    #[must_use]
    pub fn into_entry(self, id: i64, at: DateTime<Utc>) -> ConnectionHistoryEntry {
        ConnectionHistoryEntry {
            id,
            profile_id: self.profile_id,
            event_type: self.event_type,
            details: self.details,
            error_message: self.error_message,
            error_code: self.error_code,
            event_timestamp: at,
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionEventType::KeepAliveReconnect).unwrap();
        assert_eq!(json, "\"keep_alive_reconnect\"");
        assert_eq!(ConnectionEventType::ConnectFailure.as_str(), "connect_failure");
    }

    #[test]
    fn builder_collects_fields() {
        let entry = NewHistoryEntry::new(ProfileId::new(3), ConnectionEventType::ConnectFailure)
            .with_details(json!({"host": "localhost"}))
            .with_error("refused", "CONNECTION_ERROR")
            .with_duration_ms(120)
            .into_entry(1, Utc::now());

        assert_eq!(entry.profile_id, ProfileId::new(3));
        assert_eq!(entry.details["host"], "localhost");
        assert_eq!(entry.error_code.as_deref(), Some("CONNECTION_ERROR"));
        assert_eq!(entry.duration_ms, Some(120));
    }
}
