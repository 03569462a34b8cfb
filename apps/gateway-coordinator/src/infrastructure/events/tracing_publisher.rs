//! Event publisher that writes every event to the log.

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{EventPublishError, EventPublisherPort};

/// Logs each published event at `info` with its topic and payload.
///
/// Used by the binary when no push server is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisherPort for TracingEventPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), EventPublishError> {
        let payload = serde_json::to_string(&payload).map_err(|e| {
            EventPublishError::SerializationError {
                message: e.to_string(),
            }
        })?;
        tracing::info!(topic, payload = %payload, "Event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publishing_always_succeeds() {
        let publisher = TracingEventPublisher;
        assert!(publisher.publish("order-3", json!({"status": "cancelled"})).await.is_ok());
    }
}
