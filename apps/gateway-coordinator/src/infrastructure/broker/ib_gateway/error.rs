//! IB gateway adapter error types.

use thiserror::Error;

use crate::application::ports::BrokerError;

/// Errors from the IB gateway HTTP adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IbGatewayError {
    /// Transport failure (connection refused, reset, DNS).
    #[error("Network error: {0}")]
    Network(String),

    /// Service answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Message from the response body.
        message: String,
    },

    /// The gateway refused the order.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// The gateway does not know the order.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// Broker order id.
        order_id: String,
    },

    /// Connect or test reported failure.
    #[error("Connection refused by gateway: {0}")]
    ConnectionRefused(String),

    /// Response body did not match the expected shape.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Call exceeded its deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// Retries exhausted on an idempotent read.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// Attempts made.
        attempts: u32,
        /// Error of the last attempt.
        last_error: String,
    },

    /// Client could not be built from settings.
    #[error("Invalid gateway settings: {0}")]
    InvalidSettings(String),
}

impl From<IbGatewayError> for BrokerError {
    fn from(err: IbGatewayError) -> Self {
        match err {
            IbGatewayError::Network(message) | IbGatewayError::ConnectionRefused(message) => {
                Self::Connection { message }
            }
            IbGatewayError::Api { status, message } => Self::Api { status, message },
            IbGatewayError::OrderRejected(reason) => Self::OrderRejected { reason },
            IbGatewayError::OrderNotFound { order_id } => Self::OrderNotFound { order_id },
            IbGatewayError::JsonParse(message) => Self::InvalidResponse { message },
            IbGatewayError::Timeout {
                operation,
                after_ms,
            } => Self::Timeout {
                operation: operation.to_string(),
                after_ms,
            },
            err @ (IbGatewayError::MaxRetriesExceeded { .. }
            | IbGatewayError::InvalidSettings(_)) => Self::Connection {
                message: err.to_string(),
            },
        }
    }
}
