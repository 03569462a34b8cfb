//! Event Publisher Port (Driven Port)
//!
//! The push channel to external clients. The core only publishes; it does
//! not manage subscriber membership on the far side.

use async_trait::async_trait;
use serde_json::Value;

/// Event publishing error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EventPublishError {
    /// Connection error.
    #[error("Event publish connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// Serialization error.
    #[error("Event serialization error: {message}")]
    SerializationError {
        /// Error details.
        message: String,
    },

    /// Publishing failed.
    #[error("Event publish failed: {message}")]
    PublishFailed {
        /// Error details.
        message: String,
    },
}

/// Port for publishing to topic-addressed push channels.
#[async_trait]
pub trait EventPublisherPort: Send + Sync {
    /// Publish a payload on a topic (`order-<id>`, `setup-<id>`).
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), EventPublishError>;
}

/// No-op event publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisherPort for NoOpEventPublisher {
    async fn publish(&self, _topic: &str, _payload: Value) -> Result<(), EventPublishError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn no_op_publisher_succeeds() {
        let publisher = NoOpEventPublisher;
        let result = publisher.publish("order-1", json!({"status": "submitted"})).await;
        assert!(result.is_ok());
    }
}
