//! Typed publish/subscribe for order status changes and strategy signals.
//!
//! In-process subscribers register explicitly and are removed with
//! [`Notifier::unsubscribe`]. Every event is also forwarded to the external
//! push channel through [`EventPublisherPort`]. A failing subscriber or a
//! failing publish is logged and never stops delivery to the others.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::application::ports::EventPublisherPort;
use crate::domain::order_execution::{OrderExecution, OrderStatus};
use crate::domain::shared::{ExecutionId, SetupId};

/// Handle returned by [`Notifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Topic for an order's status stream.
#[must_use]
pub fn order_topic(id: ExecutionId) -> String {
    format!("order-{id}")
}

/// Topic for a setup's signal and order stream.
#[must_use]
pub fn setup_topic(id: SetupId) -> String {
    format!("setup-{id}")
}

/// Order status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    /// Execution row id.
    pub execution_id: ExecutionId,
    /// Correlated setup.
    pub setup_id: Option<SetupId>,
    /// Broker-assigned id.
    pub broker_order_id: Option<String>,
    /// Symbol.
    pub symbol: String,
    /// Status before the change, `None` on creation.
    pub previous_status: Option<OrderStatus>,
    /// New status.
    pub status: OrderStatus,
    /// Filled quantity.
    pub filled_quantity: Decimal,
    /// Average fill price.
    pub avg_fill_price: Option<Decimal>,
    /// Failure message.
    pub error_message: Option<String>,
    /// When the change was recorded.
    pub occurred_at: DateTime<Utc>,
}

impl OrderStatusChanged {
    /// Build from the stored row after a change.
    #[must_use]
    pub fn from_execution(execution: &OrderExecution, previous: Option<OrderStatus>) -> Self {
        Self {
            execution_id: execution.id,
            setup_id: execution.setup_id,
            broker_order_id: execution.broker_order_id.clone(),
            symbol: execution.symbol.clone(),
            previous_status: previous,
            status: execution.status,
            filled_quantity: execution.filled_quantity,
            avg_fill_price: execution.avg_fill_price,
            error_message: execution.error_message.clone(),
            occurred_at: execution.updated_at,
        }
    }
}

/// Events the core emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// An order moved to a new canonical status.
    OrderStatusChanged(OrderStatusChanged),
    /// A strategy signal forwarded for a setup.
    StrategySignal {
        /// Setup the signal belongs to.
        setup_id: SetupId,
        /// Signal body, passed through untouched.
        payload: Value,
    },
}

impl CoreEvent {
    /// Push topics this event is published on.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        match self {
            Self::OrderStatusChanged(change) => {
                let mut topics = vec![order_topic(change.execution_id)];
                if let Some(setup_id) = change.setup_id {
                    topics.push(setup_topic(setup_id));
                }
                topics
            }
            Self::StrategySignal { setup_id, .. } => vec![setup_topic(*setup_id)],
        }
    }

    /// Payload sent to the push channel.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::OrderStatusChanged(change) => json!({
                "type": "order_status",
                "data": change,
            }),
            Self::StrategySignal { setup_id, payload } => json!({
                "type": "signal",
                "setup_id": setup_id,
                "data": payload,
            }),
        }
    }
}

/// Subscriber callback failure.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Subscriber failed: {0}")]
pub struct SubscriberError(pub String);

/// In-process event subscriber.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one event.
    async fn on_event(&self, event: &CoreEvent) -> Result<(), SubscriberError>;
}

/// Delivery outcome of one [`Notifier::notify`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that handled the event.
    pub delivered: usize,
    /// Subscribers that returned an error.
    pub subscriber_failures: usize,
    /// Topics whose publish failed.
    pub publish_failures: usize,
}

type Subscribers = Vec<(SubscriptionId, Arc<dyn EventSubscriber>)>;

/// Event hub owned by the order coordinator.
pub struct Notifier {
    publisher: Arc<dyn EventPublisherPort>,
    subscribers: RwLock<Subscribers>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl Notifier {
    /// Create a notifier forwarding to an external publisher.
    #[must_use]
    pub fn new(publisher: Arc<dyn EventPublisherPort>) -> Self {
        Self {
            publisher,
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, subscriber));
        id
    }

    /// Remove a subscriber. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every subscriber and publish it on its topics.
    pub async fn notify(&self, event: CoreEvent) -> DeliveryReport {
        let snapshot: Subscribers = self.subscribers.read().clone();
        let mut report = DeliveryReport::default();

        for (id, subscriber) in snapshot {
            match subscriber.on_event(&event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.subscriber_failures += 1;
                    tracing::warn!(subscription = id.0, error = %e, "Event subscriber failed");
                }
            }
        }

        let payload = event.payload();
        for topic in event.topics() {
            if let Err(e) = self.publisher.publish(&topic, payload.clone()).await {
                report.publish_failures += 1;
                tracing::warn!(topic = %topic, error = %e, "Event publish failed");
            }
        }

        report
    }

    /// Publish an order's current status.
    pub async fn order_status_changed(
        &self,
        execution: &OrderExecution,
        previous: Option<OrderStatus>,
    ) -> DeliveryReport {
        self.notify(CoreEvent::OrderStatusChanged(
            OrderStatusChanged::from_execution(execution, previous),
        ))
        .await
    }

    /// Forward a strategy signal to `setup-<id>`.
    pub async fn forward_signal(&self, setup_id: SetupId, payload: Value) -> DeliveryReport {
        self.notify(CoreEvent::StrategySignal { setup_id, payload })
            .await
    }
}
