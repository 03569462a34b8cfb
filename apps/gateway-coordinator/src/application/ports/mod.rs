//! Application Ports (Driven)
//!
//! Interfaces the core uses to reach external systems: the brokerage
//! gateway and the push-notification channel.

mod broker_gateway_port;
mod event_publisher_port;
mod gateway_types;
pub mod symbols;

pub use broker_gateway_port::{
    BrokerCapability, BrokerError, BrokerGateway, BrokerType, CapabilitySet,
};
pub use event_publisher_port::{EventPublishError, EventPublisherPort, NoOpEventPublisher};
pub use gateway_types::{
    AccountSummary, AdvancedContractSearch, BrokerOrder, BrokerOrderRequest, BrokerPosition,
    ConnectionStatus, ConnectionTestResult, ContractDetails, GatewayConnectionConfig,
    HealthReport, HistoricalBar, HistoricalDataRequest, ModifyOrderRequest, Quote,
};
