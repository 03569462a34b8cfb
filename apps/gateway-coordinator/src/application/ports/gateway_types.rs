//! Request and response types of the broker gateway contract.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::connection::{AccountMode, ConnectionKind, ConnectionProfile};
use crate::domain::market_data::{Contract, Timeframe};
use crate::domain::order_execution::{OrderAction, OrderKind, OrderStatus, TimeInForce};
use crate::domain::shared::{SetupId, SignalId};

/// Parameters for a gateway connect or connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConnectionConfig {
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Client identifier.
    pub client_id: i32,
    /// Connect timeout in seconds.
    pub timeout_seconds: u32,
    /// Gateway or TWS.
    pub connection_kind: ConnectionKind,
    /// Live or paper.
    pub account_mode: AccountMode,
}

impl GatewayConnectionConfig {
    /// Connection parameters stored on a profile.
    #[must_use]
    pub fn from_profile(profile: &ConnectionProfile) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.port,
            client_id: profile.client_id,
            timeout_seconds: profile.timeout_seconds,
            connection_kind: profile.connection_kind,
            account_mode: profile.account_mode,
        }
    }

    /// Same parameters with a different client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }
}

/// Live connection state reported by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// Whether the gateway holds a live session.
    pub connected: bool,
    /// Connected host.
    pub host: Option<String>,
    /// Connected port.
    pub port: Option<u16>,
    /// Client id of the session.
    pub client_id: Option<i32>,
    /// Account mode of the session.
    pub account_mode: Option<AccountMode>,
    /// Last error reported by the gateway.
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    /// A disconnected status with no session details.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// A disconnected status carrying an error.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            last_error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Outcome of a side-channel connection test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    /// Whether the test connect succeeded.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Gateway-provided detail.
    pub details: Value,
}

/// Gateway health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether the gateway reports itself healthy.
    pub healthy: bool,
    /// Gateway-provided detail.
    pub details: Value,
}

impl HealthReport {
    /// An unhealthy report built from an error message.
    #[must_use]
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            details: serde_json::json!({ "error": error.into() }),
        }
    }
}

/// Account balances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Account identifier.
    pub account_id: Option<String>,
    /// Net liquidation value.
    pub net_liquidation: Option<Decimal>,
    /// Buying power.
    pub buying_power: Option<Decimal>,
    /// Settled cash.
    pub cash: Option<Decimal>,
    /// Base currency.
    pub currency: Option<String>,
    /// Untouched gateway payload.
    pub raw: Value,
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerPosition {
    /// Canonical symbol.
    pub symbol: String,
    /// Signed quantity.
    pub quantity: Decimal,
    /// Average cost.
    pub avg_cost: Option<Decimal>,
    /// Market value.
    pub market_value: Option<Decimal>,
    /// Unrealized P&L.
    pub unrealized_pnl: Option<Decimal>,
}

/// Order submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerOrderRequest {
    /// Canonical symbol.
    pub symbol: String,
    /// Buy or sell.
    pub action: OrderAction,
    /// Quantity (> 0).
    pub quantity: Decimal,
    /// Order type.
    pub kind: OrderKind,
    /// Limit price for LIMIT / STOP_LIMIT.
    pub limit_price: Option<Decimal>,
    /// Stop price for STOP / STOP_LIMIT.
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Correlated setup.
    pub setup_id: Option<SetupId>,
    /// Correlated signal.
    pub signal_id: Option<SignalId>,
    /// Client idempotency key.
    pub client_order_id: Option<String>,
}

/// Order as reported by the broker, with status in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerOrder {
    /// Broker-assigned id.
    pub broker_order_id: String,
    /// Client order id, when echoed.
    pub client_order_id: Option<String>,
    /// Canonical symbol.
    pub symbol: String,
    /// Buy or sell.
    pub action: OrderAction,
    /// Order type.
    pub kind: OrderKind,
    /// Total quantity.
    pub quantity: Decimal,
    /// Filled quantity.
    pub filled_quantity: Decimal,
    /// Remaining quantity.
    pub remaining_quantity: Decimal,
    /// Average fill price.
    pub avg_fill_price: Option<Decimal>,
    /// Canonical status.
    pub status: OrderStatus,
    /// Status string as the broker reported it.
    pub native_status: Option<String>,
    /// Submission time.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Last broker update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Changes to a working order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyOrderRequest {
    /// Broker-assigned id.
    pub broker_order_id: String,
    /// New quantity.
    pub quantity: Option<Decimal>,
    /// New limit price.
    pub limit_price: Option<Decimal>,
    /// New stop price.
    pub stop_price: Option<Decimal>,
}

/// Fully-specified contract search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedContractSearch {
    /// Canonical symbol.
    pub symbol: String,
    /// Security type.
    pub sec_type: Option<String>,
    /// Exchange.
    pub exchange: Option<String>,
    /// Currency.
    pub currency: Option<String>,
}

/// Contract returned by a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDetails {
    /// Broker contract id.
    pub broker_contract_id: Option<i64>,
    /// Canonical symbol.
    pub symbol: String,
    /// Security type.
    pub sec_type: String,
    /// Exchange.
    pub exchange: String,
    /// Currency.
    pub currency: String,
    /// Long name.
    pub description: Option<String>,
}

/// Historical bar request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalDataRequest {
    /// Canonical symbol.
    pub symbol: String,
    /// Bar timeframe.
    pub timeframe: Timeframe,
    /// Lookback period (`1M`, `3M`, `1Y`).
    pub period: String,
    /// Optional start date.
    pub start_date: Option<NaiveDate>,
    /// Optional end date.
    pub end_date: Option<NaiveDate>,
    /// Security type.
    pub sec_type: Option<String>,
    /// Exchange.
    pub exchange: Option<String>,
    /// Currency.
    pub currency: Option<String>,
    /// Account mode to query under.
    pub account_mode: Option<AccountMode>,
}

impl HistoricalDataRequest {
    /// Request the timeframe's default lookback for a symbol.
    #[must_use]
    pub fn for_timeframe(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            period: timeframe.lookback_period().to_string(),
            start_date: None,
            end_date: None,
            sec_type: None,
            exchange: None,
            currency: None,
            account_mode: None,
        }
    }

    /// Qualify the request with a stored contract.
    #[must_use]
    pub fn with_contract(mut self, contract: &Contract) -> Self {
        self.sec_type = Some(contract.sec_type.clone());
        self.exchange = Some(contract.exchange.clone());
        self.currency = Some(contract.currency.clone());
        self
    }
}

/// Raw historical bar. `time` is kept as sent by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalBar {
    /// Bar time as sent.
    pub time: String,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
    /// Volume.
    pub volume: Decimal,
}

/// Top-of-book snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Canonical symbol.
    pub symbol: String,
    /// Bid.
    pub bid: Option<Decimal>,
    /// Ask.
    pub ask: Option<Decimal>,
    /// Last trade.
    pub last: Option<Decimal>,
    /// Session volume.
    pub volume: Option<Decimal>,
    /// Snapshot time.
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::NewProfile;
    use crate::domain::shared::{ContractId, ProfileId};

    #[test]
    fn connection_config_from_profile() {
        let profile = NewProfile::new("paper", "127.0.0.1", 4002)
            .with_client_id(7)
            .into_profile(ProfileId::new(1), Utc::now());
        let config = GatewayConnectionConfig::from_profile(&profile).with_client_id(1007);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4002);
        assert_eq!(config.client_id, 1007);
        assert_eq!(config.account_mode, AccountMode::Paper);
    }

    #[test]
    fn history_request_uses_timeframe_lookback() {
        let contract = Contract {
            id: ContractId::new(1),
            symbol: "EUR/USD".to_string(),
            sec_type: "CASH".to_string(),
            exchange: "IDEALPRO".to_string(),
            currency: "USD".to_string(),
            broker_contract_id: None,
            description: None,
        };
        let req = HistoricalDataRequest::for_timeframe("EUR/USD", Timeframe::OneDay)
            .with_contract(&contract);

        assert_eq!(req.period, "1Y");
        assert_eq!(req.sec_type.as_deref(), Some("CASH"));
        assert_eq!(req.exchange.as_deref(), Some("IDEALPRO"));
    }

    #[test]
    fn failed_status_is_disconnected() {
        let status = ConnectionStatus::failed("socket closed");
        assert!(!status.connected);
        assert_eq!(status.last_error.as_deref(), Some("socket closed"));
    }
}
