// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::items_after_statements
    )
)]

//! Gateway Coordinator - Rust Core Library
//!
//! Coordinates a trading application's interaction with external brokerage
//! gateways.
//!
//! # Architecture (Clean Architecture + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: entities, value objects and repository traits
//!   - `connection`: connection profiles, history, lifecycle state machine
//!   - `order_execution`: canonical order status, persisted executions
//!   - `market_data`: timeframes, OHLCV bars, contracts, setups
//!
//! - **Application**: ports, services and use cases
//!   - `ports`: `BrokerGateway` contract, `EventPublisherPort`
//!   - `services`: gateway factory, notifier, collection pacing
//!   - `use_cases`: connection lifecycle, order execution, market-data collection
//!
//! - **Infrastructure**: adapters
//!   - `broker`: IB gateway HTTP adapter and the built-in factory wiring
//!   - `persistence`: in-memory stores
//!   - `events`: tracing-backed event publisher

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Domain layer - Core business rules with no I/O.
pub mod domain;

/// Application layer - Ports, services and use cases.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

pub mod config;
pub mod error;
pub mod telemetry;

// Domain re-exports
pub use domain::connection::{
    AccountMode, ConnectionEventType, ConnectionHistoryEntry, ConnectionKind, ConnectionProfile,
    LifecycleState, NewProfile, ProfileRepository, ProfileUpdate,
};
pub use domain::market_data::{
    CollectionResult, CollectionStats, MarketDataRepository, OhlcvBar, Setup, SetupRepository,
    Timeframe,
};
pub use domain::order_execution::{
    OrderAction, OrderExecution, OrderExecutionRepository, OrderFilter, OrderKind, OrderStatus,
    TimeInForce,
};
pub use domain::shared::{ContractId, ExecutionId, ProfileId, RepositoryError, SetupId};

// Application re-exports
pub use application::ports::{
    BrokerCapability, BrokerError, BrokerGateway, BrokerOrder, BrokerOrderRequest, BrokerType,
    EventPublisherPort, NoOpEventPublisher,
};
pub use application::services::{BrokerGatewayFactory, Notifier};
pub use application::use_cases::{
    ConnectionLifecycleManager, KeepAliveOutcome, MarketDataCollector, OrderExecutionCoordinator,
    PlaceOrderCommand,
};

// Infrastructure re-exports
pub use infrastructure::broker::{IbGatewayAdapter, builtin_factory};
pub use infrastructure::persistence::{
    InMemoryMarketDataRepository, InMemoryOrderExecutionRepository, InMemoryProfileRepository,
    InMemorySetupRepository,
};

pub use config::{Config, load_config, load_config_from_string};
pub use error::{CoreError, ErrorKind, ErrorPayload};
