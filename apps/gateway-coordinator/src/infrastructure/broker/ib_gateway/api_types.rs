//! IB gateway service request and response types.
//!
//! The service is lenient about field naming (snake_case and IB's camelCase
//! both appear) and about numbers arriving as strings, so responses are
//! decoded with aliases and defaults throughout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{
    AccountSummary, BrokerOrder, BrokerPosition, ContractDetails, HistoricalBar, Quote, symbols,
};
use crate::domain::connection::{AccountMode, ConnectionKind};
use crate::domain::order_execution::{OrderAction, OrderKind, OrderStatus};

use super::error::IbGatewayError;

// ============================================================================
// Shared helpers
// ============================================================================

/// A value sent either as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    /// Integer form.
    Int(i64),
    /// Float form.
    Float(f64),
    /// String form.
    Str(String),
}

impl Loose {
    /// Text form.
    pub fn into_string(self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Str(v) => v,
        }
    }
}

/// Pull a list out of a response that is either a bare array or an object
/// holding the array under `key`.
pub fn extract_list<T: serde::de::DeserializeOwned>(
    body: Value,
    key: &str,
) -> Result<Vec<T>, IbGatewayError> {
    let items = match body {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map.remove(key).unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(IbGatewayError::JsonParse(format!(
                "expected list under '{key}', got {other}"
            )));
        }
    };
    serde_json::from_value(items).map_err(|e| IbGatewayError::JsonParse(e.to_string()))
}

// ============================================================================
// Connection
// ============================================================================

/// Body of `/connection/connect` and `/connection/test`.
#[derive(Debug, Clone, Serialize)]
pub struct IbConnectRequest {
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
    /// Client id.
    pub client_id: i32,
    /// Connect timeout in seconds.
    pub timeout: u32,
    /// `tws` or `gateway`.
    pub connection_type: ConnectionKind,
    /// `paper` or `live`.
    pub account_mode: AccountMode,
}

/// Response of connect, disconnect, test and cancel.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbOutcomeResponse {
    /// Whether the call succeeded.
    #[serde(default)]
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error text on failure.
    #[serde(default)]
    pub error: Option<String>,
}

impl IbOutcomeResponse {
    /// Best available explanation.
    pub fn reason(&self, fallback: &str) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// `/health` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbHealthResponse {
    /// Connection block.
    #[serde(default)]
    pub connection: IbConnectionBlock,
}

/// `connection` block of `/health`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbConnectionBlock {
    /// Live gateway session.
    #[serde(default)]
    pub ib_gateway: IbGatewayState,
}

/// Live gateway session as reported by `/health`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbGatewayState {
    /// Connected flag.
    #[serde(default)]
    pub connected: bool,
    /// Host.
    #[serde(default)]
    pub host: Option<String>,
    /// Port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Client id.
    #[serde(default)]
    pub client_id: Option<i32>,
    /// Account mode.
    #[serde(default)]
    pub account_mode: Option<AccountMode>,
    /// Last error.
    #[serde(default)]
    pub last_error: Option<String>,
}

// ============================================================================
// Account
// ============================================================================

/// `/account/summary` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IbAccountSummary {
    /// Account id.
    #[serde(default, alias = "accountId", alias = "account")]
    pub account_id: Option<String>,
    /// Net liquidation value.
    #[serde(default, alias = "NetLiquidation", alias = "netLiquidation")]
    pub net_liquidation: Option<Decimal>,
    /// Buying power.
    #[serde(default, alias = "BuyingPower", alias = "buyingPower")]
    pub buying_power: Option<Decimal>,
    /// Cash balance.
    #[serde(
        default,
        alias = "TotalCashValue",
        alias = "total_cash_value",
        alias = "totalCashValue"
    )]
    pub cash: Option<Decimal>,
    /// Base currency.
    #[serde(default)]
    pub currency: Option<String>,
}

impl IbAccountSummary {
    /// Convert, keeping the raw body.
    pub fn into_summary(self, raw: Value) -> AccountSummary {
        AccountSummary {
            account_id: self.account_id,
            net_liquidation: self.net_liquidation,
            buying_power: self.buying_power,
            cash: self.cash,
            currency: self.currency,
            raw,
        }
    }
}

/// Item of `/account/positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct IbPosition {
    /// Broker symbol.
    pub symbol: String,
    /// Signed quantity.
    #[serde(alias = "position")]
    pub quantity: Decimal,
    /// Average cost.
    #[serde(default, alias = "avgCost")]
    pub avg_cost: Option<Decimal>,
    /// Market value.
    #[serde(default, alias = "marketValue")]
    pub market_value: Option<Decimal>,
    /// Unrealized P&L.
    #[serde(default, alias = "unrealizedPNL", alias = "unrealizedPnl")]
    pub unrealized_pnl: Option<Decimal>,
}

impl IbPosition {
    /// Convert to the canonical shape.
    pub fn into_position(self) -> BrokerPosition {
        BrokerPosition {
            symbol: symbols::from_dotted(&self.symbol),
            quantity: self.quantity,
            avg_cost: self.avg_cost,
            market_value: self.market_value,
            unrealized_pnl: self.unrealized_pnl,
        }
    }
}

// ============================================================================
// Orders
// ============================================================================

/// Body of `/orders/place`.
#[derive(Debug, Clone, Serialize)]
pub struct IbPlaceOrderRequest {
    /// Broker symbol.
    pub symbol: String,
    /// `BUY` or `SELL`.
    pub action: OrderAction,
    /// Quantity.
    pub quantity: Decimal,
    /// `MARKET`, `LIMIT`, `STOP`, `STOP_LIMIT`.
    pub order_type: OrderKind,
    /// Limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// `DAY`, `GTC`, `IOC`, `FOK`.
    pub time_in_force: String,
    /// Client order reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_ref: Option<String>,
}

/// Response of `/orders/place`.
#[derive(Debug, Clone, Deserialize)]
pub struct IbPlaceOrderResponse {
    /// Whether the gateway accepted the order.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Broker order id.
    #[serde(default, alias = "orderId")]
    pub order_id: Option<Loose>,
    /// Native status.
    #[serde(default)]
    pub status: Option<String>,
    /// Message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error text.
    #[serde(default)]
    pub error: Option<String>,
}

const fn default_true() -> bool {
    true
}

/// Body of `/orders/cancel`.
#[derive(Debug, Clone, Serialize)]
pub struct IbCancelOrderRequest {
    /// Broker order id.
    pub order_id: String,
}

/// Item of `/account/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct IbOrder {
    /// Broker order id.
    #[serde(alias = "orderId", alias = "id")]
    pub order_id: Loose,
    /// Client order reference.
    #[serde(default, alias = "orderRef", alias = "client_order_id")]
    pub order_ref: Option<String>,
    /// Broker symbol.
    pub symbol: String,
    /// `BUY` or `SELL`.
    pub action: OrderAction,
    /// Order type.
    #[serde(alias = "orderType")]
    pub order_type: String,
    /// Total quantity.
    #[serde(alias = "totalQuantity")]
    pub quantity: Decimal,
    /// Filled quantity.
    #[serde(default, alias = "filled_quantity")]
    pub filled: Decimal,
    /// Remaining quantity.
    #[serde(default)]
    pub remaining: Option<Decimal>,
    /// Average fill price.
    #[serde(default, alias = "avgFillPrice")]
    pub avg_fill_price: Option<Decimal>,
    /// Native status.
    pub status: String,
}

impl IbOrder {
    /// Convert to the canonical shape.
    pub fn into_order(self) -> BrokerOrder {
        let avg_fill_price = self.avg_fill_price.filter(|p| !p.is_zero());
        BrokerOrder {
            broker_order_id: self.order_id.into_string(),
            client_order_id: self.order_ref.filter(|r| !r.is_empty()),
            symbol: symbols::from_dotted(&self.symbol),
            action: self.action,
            kind: parse_order_kind(&self.order_type),
            quantity: self.quantity,
            filled_quantity: self.filled,
            remaining_quantity: self
                .remaining
                .unwrap_or_else(|| (self.quantity - self.filled).max(Decimal::ZERO)),
            avg_fill_price,
            status: canonical_status(&self.status, self.filled, self.quantity),
            native_status: Some(self.status),
            submitted_at: None,
            updated_at: None,
        }
    }
}

/// Map IB's order type codes onto the canonical kind.
pub fn parse_order_kind(raw: &str) -> OrderKind {
    match raw.trim().to_ascii_uppercase().replace(' ', "_").as_str() {
        "LMT" | "LIMIT" => OrderKind::Limit,
        "STP" | "STOP" => OrderKind::Stop,
        "STP_LMT" | "STOP_LIMIT" => OrderKind::StopLimit,
        _ => OrderKind::Market,
    }
}

/// Reconcile an IB native status into the canonical status.
///
/// `Submitted` with a partial fill is `partially_filled`. Unknown strings
/// fall back to `submitted`, the order having been handed over.
pub fn canonical_status(native: &str, filled: Decimal, quantity: Decimal) -> OrderStatus {
    let partially_filled = filled > Decimal::ZERO && filled < quantity;
    match native.trim() {
        "PendingSubmit" | "ApiPending" => OrderStatus::Pending,
        "PreSubmitted" | "Submitted" if partially_filled => OrderStatus::PartiallyFilled,
        "PreSubmitted" | "Submitted" | "PendingCancel" => OrderStatus::Submitted,
        "Filled" => OrderStatus::Filled,
        "Cancelled" | "ApiCancelled" => {
            if partially_filled {
                tracing::debug!(%filled, %quantity, "Partially filled order was cancelled");
            }
            OrderStatus::Cancelled
        }
        "Inactive" | "Rejected" => OrderStatus::Rejected,
        other => other.parse().unwrap_or_else(|_| {
            tracing::debug!(native = other, "Unknown native order status");
            OrderStatus::Submitted
        }),
    }
}

// ============================================================================
// Contracts
// ============================================================================

/// Body of `/contract/search`.
#[derive(Debug, Clone, Serialize)]
pub struct IbContractSearchRequest {
    /// Broker symbol.
    pub symbol: String,
}

/// Body of `/contract/advanced-search`.
#[derive(Debug, Clone, Serialize)]
pub struct IbAdvancedSearchRequest {
    /// Broker symbol.
    pub symbol: String,
    /// Security type.
    #[serde(rename = "secType", skip_serializing_if = "Option::is_none")]
    pub sec_type: Option<String>,
    /// Exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    /// Currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Item of a contract search.
#[derive(Debug, Clone, Deserialize)]
pub struct IbContract {
    /// IB contract id.
    #[serde(default, alias = "conId", alias = "con_id")]
    pub contract_id: Option<i64>,
    /// Broker symbol.
    pub symbol: String,
    /// Security type.
    #[serde(default, alias = "secType")]
    pub sec_type: String,
    /// Exchange.
    #[serde(default, alias = "primaryExchange")]
    pub exchange: String,
    /// Currency.
    #[serde(default)]
    pub currency: String,
    /// Long name.
    #[serde(default, alias = "longName")]
    pub description: Option<String>,
}

impl IbContract {
    /// Convert to the canonical shape.
    pub fn into_details(self) -> ContractDetails {
        // IB reports forex as base symbol plus currency; rebuild the pair
        let symbol = if self.sec_type == "CASH" && !self.symbol.contains(['.', '/']) {
            format!("{}/{}", self.symbol, self.currency)
        } else {
            symbols::from_dotted(&self.symbol)
        };
        ContractDetails {
            broker_contract_id: self.contract_id,
            symbol,
            sec_type: self.sec_type,
            exchange: self.exchange,
            currency: self.currency,
            description: self.description,
        }
    }
}

// ============================================================================
// Market data
// ============================================================================

/// Item of `/market-data/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct IbBar {
    /// Bar time; the service sends `time` or `timestamp`.
    #[serde(alias = "timestamp", alias = "date")]
    pub time: Loose,
    /// Open.
    pub open: Decimal,
    /// High.
    pub high: Decimal,
    /// Low.
    pub low: Decimal,
    /// Close.
    pub close: Decimal,
    /// Volume.
    #[serde(default)]
    pub volume: Decimal,
}

impl IbBar {
    /// Convert, keeping the time text as sent.
    pub fn into_bar(self) -> HistoricalBar {
        HistoricalBar {
            time: self.time.into_string(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// `/market-data/realtime` response.
#[derive(Debug, Clone, Deserialize)]
pub struct IbQuote {
    /// Broker symbol.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Bid.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Ask.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Last trade.
    #[serde(default)]
    pub last: Option<Decimal>,
    /// Volume.
    #[serde(default)]
    pub volume: Option<Decimal>,
    /// Snapshot time.
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl IbQuote {
    /// Convert to the canonical shape.
    pub fn into_quote(self, requested: &str) -> Quote {
        Quote {
            symbol: self
                .symbol
                .map_or_else(|| requested.to_string(), |s| symbols::from_dotted(&s)),
            bid: self.bid,
            ask: self.ask,
            last: self.last,
            volume: self.volume,
            timestamp: self
                .timestamp
                .as_deref()
                .and_then(crate::domain::market_data::parse_bar_time),
        }
    }
}
