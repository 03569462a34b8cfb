//! Application Use Cases
//!
//! Orchestrate domain logic and coordinate between ports.

pub mod connection_lifecycle;
pub mod market_data_collection;
pub mod order_execution;

pub use connection_lifecycle::{
    ActivationOutcome, ConnectionLifecycleManager, ConnectionOverview, ConnectionTestTarget,
    DEFAULT_TEST_CLIENT_ID_OFFSET, KeepAliveOutcome, KeepAliveSchedule, TestConnectionOutcome,
};
pub use market_data_collection::MarketDataCollector;
pub use order_execution::{
    ModifyOrderCommand, OrderExecutionCoordinator, PlaceOrderCommand, ReconcileReport,
};
