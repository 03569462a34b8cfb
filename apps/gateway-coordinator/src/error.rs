//! Errors returned by the exposed core operations.
//!
//! Every [`CoreError`] maps to an [`ErrorKind`] and serialises into an
//! [`ErrorPayload`] carrying the kind, a stable code, a human-readable
//! message and the original detail.
//!
//! | Kind | Status | Retried by the core |
//! |------|--------|---------------------|
//! | `validation` | 400 | never |
//! | `connection` | 502 | only by keep-alive |
//! | `order` | 502 | never |
//! | `timeout` | 504 | only by keep-alive (connection scope) |
//! | `not_found` | 404 | never |
//! | `conflict` | 409 | never |
//! | `unsupported` | 501 | never |
//! | `internal` | 500 | never |

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::application::ports::BrokerError;
use crate::domain::connection::ProfileValidationError;
use crate::domain::shared::RepositoryError;

/// Error category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed or missing input.
    Validation,
    /// Gateway connect, disconnect or test failure.
    Connection,
    /// Order placement or cancellation failure.
    Order,
    /// A remote call timed out.
    Timeout,
    /// Unknown id.
    NotFound,
    /// Rule violation such as deleting the default profile.
    Conflict,
    /// Broker lacks an optional capability.
    Unsupported,
    /// Unexpected failure.
    Internal,
}

/// Which family a timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutScope {
    /// Connect, status or test call.
    Connection,
    /// Order call.
    Order,
}

/// Error returned by core operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Input rejected before any remote call.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// What is wrong.
        message: String,
    },

    /// Gateway connection failure.
    #[error("Connection error: {message}")]
    Connection {
        /// Summary.
        message: String,
        /// Original detail.
        detail: Value,
    },

    /// Order failure.
    #[error("Order error: {message}")]
    Order {
        /// Summary.
        message: String,
        /// Original detail.
        detail: Value,
    },

    /// Remote call timeout.
    #[error("Timeout during {operation} after {timeout_ms}ms")]
    Timeout {
        /// Connection or order.
        scope: TimeoutScope,
        /// Operation that timed out.
        operation: String,
        /// Deadline.
        timeout_ms: u64,
    },

    /// Unknown id.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type.
        entity: String,
        /// Requested id.
        id: String,
    },

    /// Rule violation.
    #[error("Conflict: {message}")]
    Conflict {
        /// Violated rule.
        message: String,
    },

    /// Missing broker capability.
    #[error("Unsupported: {message}")]
    Unsupported {
        /// What is missing.
        message: String,
    },

    /// Unexpected failure.
    #[error("Internal error: {message}")]
    Internal {
        /// Details.
        message: String,
    },
}

/// Serialisable error returned to the route layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Category.
    pub kind: ErrorKind,
    /// Stable code (e.g. `CONNECTION_TIMEOUT`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Original detail.
    pub detail: Value,
}

impl CoreError {
    /// Validation error shorthand.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Not-found shorthand.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Translate a gateway failure raised by a connection operation.
    #[must_use]
    pub fn connection(context: &str, err: &BrokerError) -> Self {
        match err {
            BrokerError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                scope: TimeoutScope::Connection,
                operation: operation.clone(),
                timeout_ms: *after_ms,
            },
            other => Self::from_broker_common(other).unwrap_or_else(|| Self::Connection {
                message: format!("{context}: {other}"),
                detail: other.detail(),
            }),
        }
    }

    /// Translate a gateway failure raised by an order operation.
    #[must_use]
    pub fn order(context: &str, err: &BrokerError) -> Self {
        match err {
            BrokerError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                scope: TimeoutScope::Order,
                operation: operation.clone(),
                timeout_ms: *after_ms,
            },
            other => Self::from_broker_common(other).unwrap_or_else(|| Self::Order {
                message: format!("{context}: {other}"),
                detail: other.detail(),
            }),
        }
    }

    fn from_broker_common(err: &BrokerError) -> Option<Self> {
        match err {
            BrokerError::Unsupported { .. } | BrokerError::NotImplemented { .. } => {
                Some(Self::Unsupported {
                    message: err.to_string(),
                })
            }
            BrokerError::UnknownBroker { token } => Some(Self::validation(
                "broker",
                format!("unknown broker '{token}'"),
            )),
            _ => None,
        }
    }

    /// Error category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Order { .. } => ErrorKind::Order,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Stable code. Timeouts are distinguished by scope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Order { .. } => "ORDER_ERROR",
            Self::Timeout {
                scope: TimeoutScope::Connection,
                ..
            } => "CONNECTION_TIMEOUT",
            Self::Timeout {
                scope: TimeoutScope::Order,
                ..
            } => "ORDER_TIMEOUT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Unsupported { .. } => "UNSUPPORTED",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// HTTP-equivalent status for the route layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Connection | ErrorKind::Order => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::Unsupported => 501,
            ErrorKind::Internal => 500,
        }
    }

    /// Structured payload for callers.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        let detail = match self {
            Self::Validation { field, .. } => json!({ "field": field }),
            Self::Connection { detail, .. } | Self::Order { detail, .. } => detail.clone(),
            Self::Timeout {
                scope,
                operation,
                timeout_ms,
            } => json!({ "scope": scope, "operation": operation, "timeout_ms": timeout_ms }),
            Self::NotFound { entity, id } => json!({ "entity": entity, "id": id }),
            Self::Conflict { .. } | Self::Unsupported { .. } | Self::Internal { .. } => {
                Value::Null
            }
        };
        ErrorPayload {
            kind: self.kind(),
            code: self.code().to_string(),
            message: self.to_string(),
            detail,
        }
    }
}

impl From<RepositoryError> for CoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => Self::NotFound {
                entity: entity.to_string(),
                id,
            },
            RepositoryError::Conflict { message } => Self::Conflict { message },
            RepositoryError::Storage { message } => Self::Internal { message },
        }
    }
}

impl From<ProfileValidationError> for CoreError {
    fn from(err: ProfileValidationError) -> Self {
        Self::Validation {
            field: err.field.to_string(),
            message: err.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_timeout_keeps_scope() {
        let err = CoreError::connection(
            "activate",
            &BrokerError::Timeout {
                operation: "connect".to_string(),
                after_ms: 40_000,
            },
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.code(), "CONNECTION_TIMEOUT");
        assert_eq!(err.status_code(), 504);
    }

    #[test]
    fn order_timeout_has_distinct_code() {
        let err = CoreError::order(
            "place",
            &BrokerError::Timeout {
                operation: "place_order".to_string(),
                after_ms: 30_000,
            },
        );
        assert_eq!(err.code(), "ORDER_TIMEOUT");
    }

    #[test]
    fn order_rejection_carries_broker_detail() {
        let err = CoreError::order(
            "place",
            &BrokerError::OrderRejected {
                reason: "insufficient margin".to_string(),
            },
        );
        let payload = err.to_payload();
        assert_eq!(payload.kind, ErrorKind::Order);
        assert_eq!(payload.detail["code"], "ORDER_REJECTED");
        assert!(payload.message.contains("insufficient margin"));
    }

    #[test]
    fn unsupported_capability_maps_to_unsupported() {
        let err = CoreError::order(
            "modify",
            &BrokerError::Unsupported {
                capability: crate::application::ports::BrokerCapability::OrderModification,
            },
        );
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn repository_errors_convert() {
        let err: CoreError = RepositoryError::conflict("default profile cannot be deleted").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.status_code(), 409);

        let err: CoreError = RepositoryError::not_found("OrderExecution", 4).into();
        let payload = err.to_payload();
        assert_eq!(payload.kind, ErrorKind::NotFound);
        assert_eq!(payload.detail["id"], "4");
    }

    #[test]
    fn payload_serializes_snake_case_kind() {
        let payload = CoreError::validation("quantity", "must be positive").to_payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["detail"]["field"], "quantity");
    }
}
