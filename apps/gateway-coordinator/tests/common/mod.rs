//! Shared test doubles for the integration suites.
//!
//! `ScriptedGateway` answers every gateway call from per-operation queues
//! and falls back to a healthy default when a queue is empty. Every call is
//! recorded so tests can assert on what the core sent.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use gateway_coordinator::application::ports::{
    AccountSummary, AdvancedContractSearch, BrokerCapability, BrokerError, BrokerGateway,
    BrokerOrder, BrokerOrderRequest, BrokerPosition, BrokerType, CapabilitySet, ConnectionStatus,
    ConnectionTestResult, ContractDetails, EventPublishError, EventPublisherPort,
    GatewayConnectionConfig, HealthReport, HistoricalBar, HistoricalDataRequest,
    ModifyOrderRequest, Quote,
};
use gateway_coordinator::application::services::{
    BrokerGatewayFactory, GatewayConstructor, GatewaySettings,
};
use gateway_coordinator::{OrderAction, OrderKind, OrderStatus};

type Scripted<T> = Mutex<VecDeque<Result<T, BrokerError>>>;

/// A gateway call as the core issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect(GatewayConnectionConfig),
    Disconnect,
    Status,
    Test(GatewayConnectionConfig),
    Health,
    PlaceOrder(BrokerOrderRequest),
    CancelOrder(String),
    OrderStatus(String),
    ModifyOrder(ModifyOrderRequest),
    SearchContracts(String),
    SearchContractsAdvanced(AdvancedContractSearch),
    HistoricalData(HistoricalDataRequest),
}

/// Gateway double driven by queued responses.
#[derive(Default)]
pub struct ScriptedGateway {
    capabilities: CapabilitySet,
    connected: Mutex<bool>,
    status_delay: Mutex<Option<Duration>>,
    connect: Scripted<ConnectionStatus>,
    status: Scripted<ConnectionStatus>,
    test: Scripted<ConnectionTestResult>,
    place: Scripted<BrokerOrder>,
    cancel: Scripted<bool>,
    order_status: Scripted<Option<BrokerOrder>>,
    modify: Scripted<BrokerOrder>,
    search: Scripted<Vec<ContractDetails>>,
    search_advanced: Scripted<Vec<ContractDetails>>,
    history: Scripted<Vec<HistoricalBar>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_capabilities(capabilities: &[BrokerCapability]) -> Arc<Self> {
        Arc::new(Self {
            capabilities: capabilities.iter().copied().collect(),
            ..Self::default()
        })
    }

    /// Set the session flag reported by `connection_status` when its queue
    /// is empty.
    pub fn set_connected(&self, connected: bool) {
        *self.connected.lock() = connected;
    }

    /// Delay every `connection_status` answer.
    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock() = Some(delay);
    }

    pub fn push_connect(&self, result: Result<ConnectionStatus, BrokerError>) {
        self.connect.lock().push_back(result);
    }

    pub fn push_status(&self, result: Result<ConnectionStatus, BrokerError>) {
        self.status.lock().push_back(result);
    }

    pub fn push_test(&self, result: Result<ConnectionTestResult, BrokerError>) {
        self.test.lock().push_back(result);
    }

    pub fn push_place(&self, result: Result<BrokerOrder, BrokerError>) {
        self.place.lock().push_back(result);
    }

    pub fn push_cancel(&self, result: Result<bool, BrokerError>) {
        self.cancel.lock().push_back(result);
    }

    pub fn push_order_status(&self, result: Result<Option<BrokerOrder>, BrokerError>) {
        self.order_status.lock().push_back(result);
    }

    pub fn push_modify(&self, result: Result<BrokerOrder, BrokerError>) {
        self.modify.lock().push_back(result);
    }

    pub fn push_search(&self, result: Result<Vec<ContractDetails>, BrokerError>) {
        self.search.lock().push_back(result);
    }

    pub fn push_search_advanced(&self, result: Result<Vec<ContractDetails>, BrokerError>) {
        self.search_advanced.lock().push_back(result);
    }

    pub fn push_history(&self, result: Result<Vec<HistoricalBar>, BrokerError>) {
        self.history.lock().push_back(result);
    }

    /// Every call recorded so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn connected_status(config: &GatewayConnectionConfig) -> ConnectionStatus {
        ConnectionStatus {
            connected: true,
            host: Some(config.host.clone()),
            port: Some(config.port),
            client_id: Some(config.client_id),
            account_mode: Some(config.account_mode),
            last_error: None,
        }
    }
}

fn next<T>(queue: &Scripted<T>) -> Option<Result<T, BrokerError>> {
    queue.lock().pop_front()
}

#[async_trait]
impl BrokerGateway for ScriptedGateway {
    fn broker_type(&self) -> BrokerType {
        BrokerType::Ibkr
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities.clone()
    }

    async fn connect(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionStatus, BrokerError> {
        self.record(Call::Connect(config.clone()));
        let result = next(&self.connect).unwrap_or_else(|| Ok(Self::connected_status(config)));
        if let Ok(status) = &result {
            *self.connected.lock() = status.connected;
        }
        result
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        self.record(Call::Disconnect);
        *self.connected.lock() = false;
        Ok(())
    }

    async fn connection_status(&self) -> Result<ConnectionStatus, BrokerError> {
        self.record(Call::Status);
        let delay = *self.status_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        next(&self.status).unwrap_or_else(|| {
            Ok(ConnectionStatus {
                connected: *self.connected.lock(),
                ..ConnectionStatus::default()
            })
        })
    }

    async fn test_connection(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionTestResult, BrokerError> {
        self.record(Call::Test(config.clone()));
        next(&self.test).unwrap_or_else(|| {
            Ok(ConnectionTestResult {
                success: true,
                message: "connected".to_string(),
                details: json!({ "client_id": config.client_id }),
            })
        })
    }

    async fn health_check(&self) -> Result<HealthReport, BrokerError> {
        self.record(Call::Health);
        Ok(HealthReport {
            healthy: *self.connected.lock(),
            details: Value::Null,
        })
    }

    async fn account_summary(&self) -> Result<AccountSummary, BrokerError> {
        Ok(AccountSummary::default())
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(Vec::new())
    }

    async fn orders(&self) -> Result<Vec<BrokerOrder>, BrokerError> {
        Ok(Vec::new())
    }

    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<BrokerOrder, BrokerError> {
        self.record(Call::PlaceOrder(request.clone()));
        let placed = self
            .count(|c| matches!(c, Call::PlaceOrder(_)))
            .to_string();
        next(&self.place).unwrap_or_else(|| {
            Ok(broker_order(
                &format!("B-{placed}"),
                &request.symbol,
                request.quantity,
                OrderStatus::Submitted,
            ))
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<bool, BrokerError> {
        self.record(Call::CancelOrder(broker_order_id.to_string()));
        next(&self.cancel).unwrap_or(Ok(true))
    }

    async fn order_status(
        &self,
        broker_order_id: &str,
    ) -> Result<Option<BrokerOrder>, BrokerError> {
        self.record(Call::OrderStatus(broker_order_id.to_string()));
        next(&self.order_status).unwrap_or(Ok(None))
    }

    async fn modify_order(&self, request: &ModifyOrderRequest) -> Result<BrokerOrder, BrokerError> {
        self.record(Call::ModifyOrder(request.clone()));
        if !self.capabilities.supports(BrokerCapability::OrderModification) {
            return Err(BrokerError::Unsupported {
                capability: BrokerCapability::OrderModification,
            });
        }
        next(&self.modify).unwrap_or_else(|| {
            Ok(broker_order(
                &request.broker_order_id,
                "AAPL",
                request.quantity.unwrap_or(Decimal::ONE),
                OrderStatus::Submitted,
            ))
        })
    }

    async fn search_contracts(&self, symbol: &str) -> Result<Vec<ContractDetails>, BrokerError> {
        self.record(Call::SearchContracts(symbol.to_string()));
        next(&self.search).unwrap_or(Ok(Vec::new()))
    }

    async fn search_contracts_advanced(
        &self,
        query: &AdvancedContractSearch,
    ) -> Result<Vec<ContractDetails>, BrokerError> {
        self.record(Call::SearchContractsAdvanced(query.clone()));
        if !self
            .capabilities
            .supports(BrokerCapability::AdvancedContractSearch)
        {
            return Err(BrokerError::Unsupported {
                capability: BrokerCapability::AdvancedContractSearch,
            });
        }
        next(&self.search_advanced).unwrap_or(Ok(Vec::new()))
    }

    async fn historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<HistoricalBar>, BrokerError> {
        self.record(Call::HistoricalData(request.clone()));
        next(&self.history).unwrap_or(Ok(Vec::new()))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        Ok(Quote {
            symbol: symbol.to_string(),
            bid: None,
            ask: None,
            last: None,
            volume: None,
            timestamp: Some(Utc::now()),
        })
    }
}

/// Factory whose IB constructor always hands out `gateway`.
pub fn factory_with(gateway: &Arc<ScriptedGateway>) -> Arc<BrokerGatewayFactory> {
    let factory = BrokerGatewayFactory::new();
    let shared = Arc::clone(gateway);
    let constructor: GatewayConstructor = Arc::new(move |_settings: &GatewaySettings| {
        let gateway: Arc<dyn BrokerGateway> = Arc::clone(&shared) as _;
        Ok(gateway)
    });
    factory.register(BrokerType::Ibkr, constructor);
    Arc::new(factory)
}

/// Broker order report with sensible defaults for the rest.
pub fn broker_order(
    broker_order_id: &str,
    symbol: &str,
    quantity: Decimal,
    status: OrderStatus,
) -> BrokerOrder {
    let filled = if status == OrderStatus::Filled {
        quantity
    } else {
        Decimal::ZERO
    };
    BrokerOrder {
        broker_order_id: broker_order_id.to_string(),
        client_order_id: None,
        symbol: symbol.to_string(),
        action: OrderAction::Buy,
        kind: OrderKind::Market,
        quantity,
        filled_quantity: filled,
        remaining_quantity: quantity - filled,
        avg_fill_price: None,
        status,
        native_status: Some(status.as_str().to_string()),
        submitted_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

/// Daily bar with the given date (`YYYYMMDD`) and close.
pub fn daily_bar(date: &str, close: Decimal) -> HistoricalBar {
    HistoricalBar {
        time: date.to_string(),
        open: close,
        high: close,
        low: close,
        close,
        volume: Decimal::from(1000),
    }
}

/// Publisher that records every publish and can be told to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, Value)>>,
    fail: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().clone()
    }

    pub fn topics(&self) -> Vec<String> {
        self.published.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl EventPublisherPort for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), EventPublishError> {
        if *self.fail.lock() {
            return Err(EventPublishError::PublishFailed {
                message: "publisher offline".to_string(),
            });
        }
        self.published.lock().push((topic.to_string(), payload));
        Ok(())
    }
}
