//! Application Services
//!
//! Components shared by the use cases: the gateway factory, the event
//! notifier and collection pacing.

mod gateway_factory;
mod notifier;
mod pacing;

pub use gateway_factory::{
    BrokerGatewayFactory, GatewayConstructor, GatewaySettings, RetrySettings,
};
pub use notifier::{
    CoreEvent, DeliveryReport, EventSubscriber, Notifier, OrderStatusChanged, SubscriberError,
    SubscriptionId, order_topic, setup_topic,
};
pub use pacing::CollectionPacing;
