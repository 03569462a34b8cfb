//! Persisted projection of an order attempt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::{OrderAction, OrderKind, OrderStatus, TimeInForce};
use crate::domain::shared::{ContractId, ExecutionId, SetupId, SignalId};

/// One order attempt as stored by the coordinator.
///
/// Rows are created on every placement attempt, including failed ones, and
/// are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExecution {
    /// Internal id.
    pub id: ExecutionId,
    /// Correlated setup.
    pub setup_id: Option<SetupId>,
    /// Correlated strategy signal.
    pub signal_id: Option<SignalId>,
    /// Instrument reference.
    pub contract_id: Option<ContractId>,
    /// Canonical symbol that was submitted.
    pub symbol: String,
    /// Order type.
    pub kind: OrderKind,
    /// Buy or sell.
    pub action: OrderAction,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Limit price.
    pub price: Option<Decimal>,
    /// Stop price.
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Client-generated idempotency key.
    pub client_order_id: String,
    /// Broker-assigned id; absent when submission failed.
    pub broker_order_id: Option<String>,
    /// Canonical status.
    pub status: OrderStatus,
    /// Filled quantity.
    pub filled_quantity: Decimal,
    /// Average fill price.
    pub avg_fill_price: Option<Decimal>,
    /// Captured failure message.
    pub error_message: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl OrderExecution {
    /// Quantity still working.
    #[must_use]
    pub fn remaining_quantity(&self) -> Decimal {
        (self.quantity - self.filled_quantity).max(Decimal::ZERO)
    }

    /// Whether the order can still change.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Row to insert; the repository assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderExecution {
    /// Correlated setup.
    pub setup_id: Option<SetupId>,
    /// Correlated strategy signal.
    pub signal_id: Option<SignalId>,
    /// Instrument reference.
    pub contract_id: Option<ContractId>,
    /// Canonical symbol.
    pub symbol: String,
    /// Order type.
    pub kind: OrderKind,
    /// Buy or sell.
    pub action: OrderAction,
    /// Quantity.
    pub quantity: Decimal,
    /// Limit price.
    pub price: Option<Decimal>,
    /// Stop price.
    pub stop_price: Option<Decimal>,
    /// Time in force.
    pub time_in_force: TimeInForce,
    /// Client order id.
    pub client_order_id: String,
    /// Broker order id.
    pub broker_order_id: Option<String>,
    /// Initial status (`submitted` or `rejected`).
    pub status: OrderStatus,
    /// Filled quantity reported at submission.
    pub filled_quantity: Decimal,
    /// Average fill price reported at submission.
    pub avg_fill_price: Option<Decimal>,
    /// Failure message.
    pub error_message: Option<String>,
}

impl NewOrderExecution {
    /// Materialise the stored row.
    #[must_use]
    pub fn into_execution(self, id: ExecutionId, now: DateTime<Utc>) -> OrderExecution {
        OrderExecution {
            id,
            setup_id: self.setup_id,
            signal_id: self.signal_id,
            contract_id: self.contract_id,
            symbol: self.symbol,
            kind: self.kind,
            action: self.action,
            quantity: self.quantity,
            price: self.price,
            stop_price: self.stop_price,
            time_in_force: self.time_in_force,
            client_order_id: self.client_order_id,
            broker_order_id: self.broker_order_id,
            status: self.status,
            filled_quantity: self.filled_quantity,
            avg_fill_price: self.avg_fill_price,
            error_message: self.error_message,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_row(status: OrderStatus) -> NewOrderExecution {
        NewOrderExecution {
            setup_id: Some(SetupId::new(7)),
            signal_id: None,
            contract_id: None,
            symbol: "AAPL".to_string(),
            kind: OrderKind::Limit,
            action: OrderAction::Buy,
            quantity: dec!(10),
            price: Some(dec!(150.25)),
            stop_price: None,
            time_in_force: TimeInForce::Day,
            client_order_id: "c-1".to_string(),
            broker_order_id: Some("42".to_string()),
            status,
            filled_quantity: dec!(4),
            avg_fill_price: Some(dec!(150.10)),
            error_message: None,
        }
    }

    #[test]
    fn into_execution_carries_fields() {
        let now = Utc::now();
        let row = new_row(OrderStatus::PartiallyFilled).into_execution(ExecutionId::new(1), now);
        assert_eq!(row.id, ExecutionId::new(1));
        assert_eq!(row.broker_order_id.as_deref(), Some("42"));
        assert_eq!(row.created_at, now);
        assert_eq!(row.remaining_quantity(), dec!(6));
        assert!(row.is_open());
    }

    #[test]
    fn rejected_row_is_closed() {
        let row = new_row(OrderStatus::Rejected).into_execution(ExecutionId::new(2), Utc::now());
        assert!(!row.is_open());
    }
}
