//! Broker Gateway Port (Driven Port)
//!
//! The contract every brokerage integration implements. Order, lifecycle
//! and collection logic run against this trait only.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::gateway_types::{
    AccountSummary, AdvancedContractSearch, BrokerOrder, BrokerOrderRequest, BrokerPosition,
    ConnectionStatus, ConnectionTestResult, ContractDetails, GatewayConnectionConfig,
    HealthReport, HistoricalBar, HistoricalDataRequest, ModifyOrderRequest, Quote,
};
use super::symbols;

/// Broker back ends known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerType {
    /// Interactive Brokers via its gateway service.
    Ibkr,
    /// Alpaca.
    Alpaca,
    /// Charles Schwab.
    Schwab,
}

impl BrokerType {
    /// Every known broker type.
    pub const ALL: [Self; 3] = [Self::Ibkr, Self::Alpaca, Self::Schwab];

    /// Configuration token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ibkr => "ibkr",
            Self::Alpaca => "alpaca",
            Self::Schwab => "schwab",
        }
    }
}

impl fmt::Display for BrokerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerType {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == token)
            .ok_or(BrokerError::UnknownBroker { token })
    }
}

/// Optional operations a gateway may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerCapability {
    /// [`BrokerGateway::search_contracts_advanced`].
    AdvancedContractSearch,
    /// [`BrokerGateway::modify_order`].
    OrderModification,
}

impl fmt::Display for BrokerCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AdvancedContractSearch => "advanced_contract_search",
            Self::OrderModification => "order_modification",
        };
        f.write_str(s)
    }
}

/// Capabilities declared by a gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(BTreeSet<BrokerCapability>);

impl CapabilitySet {
    /// No optional capabilities.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Check for a capability.
    #[must_use]
    pub fn supports(&self, capability: BrokerCapability) -> bool {
        self.0.contains(&capability)
    }

    /// Iterate declared capabilities.
    pub fn iter(&self) -> impl Iterator<Item = BrokerCapability> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<BrokerCapability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = BrokerCapability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Gateway layer error.
///
/// Transport failures are translated into these variants; none are
/// swallowed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Connect, disconnect or transport failure.
    #[error("Broker connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Remote call exceeded its deadline.
    #[error("Broker call '{operation}' timed out after {after_ms}ms")]
    Timeout {
        /// Operation that timed out.
        operation: String,
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// Order rejected by the broker.
    #[error("Order rejected: {reason}")]
    OrderRejected {
        /// Rejection reason.
        reason: String,
    },

    /// Broker does not know the order.
    #[error("Order not found: {order_id}")]
    OrderNotFound {
        /// The missing order ID.
        order_id: String,
    },

    /// Optional capability not offered by this gateway.
    #[error("Operation not supported by this broker: {capability}")]
    Unsupported {
        /// Missing capability.
        capability: BrokerCapability,
    },

    /// Known broker type without an implementation.
    #[error("Broker '{broker}' is not implemented")]
    NotImplemented {
        /// Broker type.
        broker: BrokerType,
    },

    /// Unrecognised broker token.
    #[error("Unknown broker '{token}'")]
    UnknownBroker {
        /// Token as given.
        token: String,
    },

    /// Response could not be interpreted.
    #[error("Invalid broker response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },

    /// Gateway answered with an error status.
    #[error("Broker API error ({status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Error body.
        message: String,
    },
}

impl BrokerError {
    /// Machine-readable code stored in history and error payloads.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "CONNECTION_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::OrderRejected { .. } => "ORDER_REJECTED",
            Self::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            Self::Unsupported { .. } => "UNSUPPORTED",
            Self::NotImplemented { .. } => "NOT_IMPLEMENTED",
            Self::UnknownBroker { .. } => "UNKNOWN_BROKER",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Api { .. } => "API_ERROR",
        }
    }

    /// Whether this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Structured detail for error payloads.
    #[must_use]
    pub fn detail(&self) -> Value {
        match self {
            Self::Timeout {
                operation,
                after_ms,
            } => json!({ "code": self.code(), "operation": operation, "timeout_ms": after_ms }),
            Self::Api { status, message } => {
                json!({ "code": self.code(), "status": status, "body": message })
            }
            Self::Unsupported { capability } => {
                json!({ "code": self.code(), "capability": capability })
            }
            Self::NotImplemented { broker } => json!({ "code": self.code(), "broker": broker }),
            Self::UnknownBroker { token } => json!({ "code": self.code(), "broker": token }),
            Self::OrderNotFound { order_id } => {
                json!({ "code": self.code(), "order_id": order_id })
            }
            Self::Connection { .. } | Self::OrderRejected { .. } | Self::InvalidResponse { .. } => {
                json!({ "code": self.code(), "message": self.to_string() })
            }
        }
    }
}

/// Port for brokerage gateway interactions.
///
/// Every operation is independently failable. Optional operations default
/// to [`BrokerError::Unsupported`]; implementations that override one must
/// declare the matching capability in [`BrokerGateway::capabilities`].
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Which broker this gateway talks to.
    fn broker_type(&self) -> BrokerType;

    /// Optional capabilities this gateway supports.
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::none()
    }

    /// Open the live session.
    async fn connect(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionStatus, BrokerError>;

    /// Close the live session.
    async fn disconnect(&self) -> Result<(), BrokerError>;

    /// Live session state.
    async fn connection_status(&self) -> Result<ConnectionStatus, BrokerError>;

    /// Try a side-channel connect without touching the live session.
    async fn test_connection(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionTestResult, BrokerError>;

    /// Gateway health.
    async fn health_check(&self) -> Result<HealthReport, BrokerError>;

    /// Account balances.
    async fn account_summary(&self) -> Result<AccountSummary, BrokerError>;

    /// Open positions.
    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Orders known to the broker.
    async fn orders(&self) -> Result<Vec<BrokerOrder>, BrokerError>;

    /// Submit an order. A broker rejection is an error.
    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<BrokerOrder, BrokerError>;

    /// Cancel an order; `false` if the broker declined.
    async fn cancel_order(&self, broker_order_id: &str) -> Result<bool, BrokerError>;

    /// Current state of an order, `None` if the broker does not know it.
    async fn order_status(&self, broker_order_id: &str)
    -> Result<Option<BrokerOrder>, BrokerError>;

    /// Change a working order.
    async fn modify_order(&self, _request: &ModifyOrderRequest) -> Result<BrokerOrder, BrokerError> {
        Err(BrokerError::Unsupported {
            capability: BrokerCapability::OrderModification,
        })
    }

    /// Search contracts by symbol.
    async fn search_contracts(&self, symbol: &str) -> Result<Vec<ContractDetails>, BrokerError>;

    /// Search contracts with full qualification.
    async fn search_contracts_advanced(
        &self,
        _query: &AdvancedContractSearch,
    ) -> Result<Vec<ContractDetails>, BrokerError> {
        Err(BrokerError::Unsupported {
            capability: BrokerCapability::AdvancedContractSearch,
        })
    }

    /// Historical bars.
    async fn historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<HistoricalBar>, BrokerError>;

    /// Top-of-book snapshot.
    async fn quote(&self, symbol: &str) -> Result<Quote, BrokerError>;

    /// Canonical symbol to broker symbol.
    fn to_broker_symbol(&self, canonical: &str) -> String {
        symbols::to_dotted(canonical)
    }

    /// Broker symbol to canonical symbol. Inverse of
    /// [`BrokerGateway::to_broker_symbol`].
    fn to_canonical_symbol(&self, broker: &str) -> String {
        symbols::from_dotted(broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_type_tokens() {
        assert_eq!("ibkr".parse::<BrokerType>().unwrap(), BrokerType::Ibkr);
        assert_eq!(" Schwab ".parse::<BrokerType>().unwrap(), BrokerType::Schwab);
        assert_eq!(BrokerType::Alpaca.to_string(), "alpaca");
    }

    #[test]
    fn unknown_broker_token() {
        let err = "etrade".parse::<BrokerType>().unwrap_err();
        assert_eq!(
            err,
            BrokerError::UnknownBroker {
                token: "etrade".to_string()
            }
        );
        assert_eq!(err.code(), "UNKNOWN_BROKER");
    }

    #[test]
    fn capability_set_membership() {
        let caps: CapabilitySet = [BrokerCapability::AdvancedContractSearch]
            .into_iter()
            .collect();
        assert!(caps.supports(BrokerCapability::AdvancedContractSearch));
        assert!(!caps.supports(BrokerCapability::OrderModification));
        assert!(!CapabilitySet::none().supports(BrokerCapability::OrderModification));
    }

    #[test]
    fn timeout_detail_carries_deadline() {
        let err = BrokerError::Timeout {
            operation: "connect".to_string(),
            after_ms: 35_000,
        };
        assert!(err.is_timeout());
        let detail = err.detail();
        assert_eq!(detail["code"], "TIMEOUT");
        assert_eq!(detail["timeout_ms"], 35_000);
    }
}
