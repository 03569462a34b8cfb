//! Order Execution Use Case
//!
//! Places and cancels orders through the broker gateway and keeps the
//! persisted `OrderExecution` rows in step with broker state. Every placement
//! attempt is persisted, including rejected ones.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::ports::{
    BrokerCapability, BrokerGateway, BrokerOrder, BrokerOrderRequest, BrokerType,
    ModifyOrderRequest,
};
use crate::application::services::{BrokerGatewayFactory, DeliveryReport, Notifier};
use crate::domain::market_data::SetupRepository;
use crate::domain::order_execution::{
    NewOrderExecution, OrderAction, OrderExecution, OrderExecutionRepository, OrderFilter,
    OrderKind, OrderStatus, TimeInForce,
};
use crate::domain::shared::{ContractId, ExecutionId, SetupId, SignalId};
use crate::error::CoreError;

/// Order placement input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrderCommand {
    /// Symbol; taken from the setup when `setup_id` is given.
    #[serde(default)]
    pub symbol: Option<String>,
    /// Correlated setup.
    #[serde(default)]
    pub setup_id: Option<SetupId>,
    /// Correlated signal.
    #[serde(default)]
    pub signal_id: Option<SignalId>,
    /// Buy or sell.
    pub action: OrderAction,
    /// Quantity.
    pub quantity: Decimal,
    /// Order type.
    pub kind: OrderKind,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<Decimal>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    /// Time in force.
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

impl PlaceOrderCommand {
    /// Market order for a symbol.
    #[must_use]
    pub fn market(symbol: impl Into<String>, action: OrderAction, quantity: Decimal) -> Self {
        Self {
            symbol: Some(symbol.into()),
            setup_id: None,
            signal_id: None,
            action,
            quantity,
            kind: OrderKind::Market,
            limit_price: None,
            stop_price: None,
            time_in_force: TimeInForce::Day,
        }
    }

    /// Limit order for a symbol.
    #[must_use]
    pub fn limit(
        symbol: impl Into<String>,
        action: OrderAction,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            kind: OrderKind::Limit,
            limit_price: Some(price),
            ..Self::market(symbol, action, quantity)
        }
    }

    /// Correlate with a setup.
    #[must_use]
    pub const fn for_setup(mut self, setup_id: SetupId) -> Self {
        self.setup_id = Some(setup_id);
        self
    }

    /// Check quantity and prices before any remote call.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::validation("quantity", "must be greater than zero"));
        }
        if self.kind.requires_limit_price() {
            match self.limit_price {
                None => {
                    return Err(CoreError::validation(
                        "limit_price",
                        format!("required for {} orders", self.kind),
                    ));
                }
                Some(price) if price <= Decimal::ZERO => {
                    return Err(CoreError::validation("limit_price", "must be positive"));
                }
                Some(_) => {}
            }
        }
        if self.kind.requires_stop_price() {
            match self.stop_price {
                None => {
                    return Err(CoreError::validation(
                        "stop_price",
                        format!("required for {} orders", self.kind),
                    ));
                }
                Some(price) if price <= Decimal::ZERO => {
                    return Err(CoreError::validation("stop_price", "must be positive"));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Changes to a working order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifyOrderCommand {
    /// New quantity.
    pub quantity: Option<Decimal>,
    /// New limit price.
    pub limit_price: Option<Decimal>,
    /// New stop price.
    pub stop_price: Option<Decimal>,
}

/// Result of [`OrderExecutionCoordinator::reconcile_open_orders`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Open orders inspected.
    pub checked: usize,
    /// Orders whose stored row changed.
    pub updated: usize,
    /// Orders whose refresh failed.
    pub failed: usize,
    /// Failure messages, one per failed order.
    pub errors: Vec<String>,
}

/// Use case owning order placement, cancellation and reconciliation.
pub struct OrderExecutionCoordinator<O, S>
where
    O: OrderExecutionRepository,
    S: SetupRepository,
{
    orders: Arc<O>,
    setups: Arc<S>,
    factory: Arc<BrokerGatewayFactory>,
    notifier: Arc<Notifier>,
    broker: BrokerType,
}

impl<O, S> OrderExecutionCoordinator<O, S>
where
    O: OrderExecutionRepository,
    S: SetupRepository,
{
    /// Create a new coordinator.
    pub const fn new(
        orders: Arc<O>,
        setups: Arc<S>,
        factory: Arc<BrokerGatewayFactory>,
        notifier: Arc<Notifier>,
        broker: BrokerType,
    ) -> Self {
        Self {
            orders,
            setups,
            factory,
            notifier,
            broker,
        }
    }

    /// Event hub used for status changes.
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    /// Validate, submit and persist an order.
    ///
    /// Once the command is valid and its setup resolves, every attempt is
    /// persisted: a missing gateway or a gateway failure stores a `rejected`
    /// row before the error is returned. Invalid commands and unknown setups
    /// are refused without a row.
    pub async fn place_order(&self, command: PlaceOrderCommand) -> Result<OrderExecution, CoreError> {
        // 1. Validate before any remote call
        command.validate()?;

        // 2. Resolve the instrument
        let (symbol, contract_id) = self.resolve_symbol(&command).await?;

        // 3. Submit
        let client_order_id = uuid::Uuid::new_v4().to_string();
        let request = BrokerOrderRequest {
            symbol: symbol.clone(),
            action: command.action,
            quantity: command.quantity,
            kind: command.kind,
            limit_price: command.limit_price,
            stop_price: command.stop_price,
            time_in_force: command.time_in_force,
            setup_id: command.setup_id,
            signal_id: command.signal_id,
            client_order_id: Some(client_order_id.clone()),
        };
        let submitted = match self.gateway() {
            Ok(gateway) => gateway
                .place_order(&request)
                .await
                .map_err(|e| CoreError::order("place order", &e)),
            Err(e) => Err(e),
        };

        // 4. Persist the attempt either way
        let mut row = NewOrderExecution {
            setup_id: command.setup_id,
            signal_id: command.signal_id,
            contract_id,
            symbol,
            kind: command.kind,
            action: command.action,
            quantity: command.quantity,
            price: command.limit_price,
            stop_price: command.stop_price,
            time_in_force: command.time_in_force,
            client_order_id,
            broker_order_id: None,
            status: OrderStatus::Rejected,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            error_message: None,
        };

        let failure = match submitted {
            Ok(order) => {
                row.broker_order_id = Some(order.broker_order_id);
                row.status = initial_status(order.status);
                row.filled_quantity = order.filled_quantity;
                row.avg_fill_price = order.avg_fill_price;
                None
            }
            Err(error) => {
                row.error_message = Some(error.to_string());
                Some(error)
            }
        };

        let execution = self.orders.insert(row).await?;

        // 5. Publish
        self.notifier.order_status_changed(&execution, None).await;

        match failure {
            None => {
                tracing::info!(
                    execution_id = %execution.id,
                    broker_order_id = ?execution.broker_order_id,
                    symbol = %execution.symbol,
                    status = %execution.status,
                    "Order submitted"
                );
                Ok(execution)
            }
            Some(error) => {
                tracing::error!(
                    execution_id = %execution.id,
                    symbol = %execution.symbol,
                    error = %error,
                    "Order placement failed"
                );
                Err(error)
            }
        }
    }

    /// Cancel a working order.
    pub async fn cancel_order(&self, id: ExecutionId) -> Result<OrderExecution, CoreError> {
        // 1. Load and check the row
        let mut execution = self.load(id).await?;
        let broker_order_id = execution.broker_order_id.clone().ok_or_else(|| {
            CoreError::validation("broker_order_id", format!("order {id} was never accepted by the broker"))
        })?;
        if execution.status.is_terminal() {
            return Err(CoreError::Conflict {
                message: format!("order {id} is already {}", execution.status),
            });
        }

        // 2. Cancel at the broker
        let gateway = self.gateway()?;
        let cancelled = gateway
            .cancel_order(&broker_order_id)
            .await
            .map_err(|e| CoreError::order("cancel order", &e))?;
        if !cancelled {
            return Err(CoreError::Order {
                message: format!("broker declined to cancel order {broker_order_id}"),
                detail: Value::Null,
            });
        }

        // 3. Persist and publish
        let previous = execution.status;
        execution.status = OrderStatus::Cancelled;
        execution.updated_at = Utc::now();
        self.orders.update(&execution).await?;
        self.notifier
            .order_status_changed(&execution, Some(previous))
            .await;

        tracing::info!(execution_id = %id, broker_order_id = %broker_order_id, "Order cancelled");
        Ok(execution)
    }

    /// Pull the broker's view of one order into the stored row.
    ///
    /// Terminal rows and rows without a broker id are returned unchanged.
    /// A broker status that would move the row backwards is ignored.
    pub async fn refresh_order_status(&self, id: ExecutionId) -> Result<OrderExecution, CoreError> {
        let execution = self.load(id).await?;
        let Some(broker_order_id) = execution.broker_order_id.clone() else {
            return Ok(execution);
        };
        if execution.status.is_terminal() {
            return Ok(execution);
        }

        let gateway = self.gateway()?;
        let Some(report) = gateway
            .order_status(&broker_order_id)
            .await
            .map_err(|e| CoreError::order("order status", &e))?
        else {
            tracing::warn!(execution_id = %id, broker_order_id = %broker_order_id, "Broker does not know order");
            return Ok(execution);
        };

        Ok(self.apply_broker_report(execution, &report, false).await?.0)
    }

    /// Refresh every non-terminal order. A failing order does not stop the rest.
    pub async fn reconcile_open_orders(&self) -> Result<ReconcileReport, CoreError> {
        let open = self.orders.list_open().await?;
        let mut report = ReconcileReport::default();

        for execution in open {
            report.checked += 1;
            let before = execution.clone();
            match self.refresh_order_status(execution.id).await {
                Ok(after) if after != before => report.updated += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(execution_id = %before.id, error = %e, "Order reconcile failed");
                    report.failed += 1;
                    report.errors.push(format!("order {}: {e}", before.id));
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            updated = report.updated,
            failed = report.failed,
            "Open order reconciliation finished"
        );
        Ok(report)
    }

    /// Modify a working order, if the gateway supports it.
    pub async fn modify_order(
        &self,
        id: ExecutionId,
        command: ModifyOrderCommand,
    ) -> Result<OrderExecution, CoreError> {
        if command.quantity.is_some_and(|q| q <= Decimal::ZERO) {
            return Err(CoreError::validation("quantity", "must be greater than zero"));
        }
        let mut execution = self.load(id).await?;
        if execution.status.is_terminal() {
            return Err(CoreError::Conflict {
                message: format!("order {id} is already {}", execution.status),
            });
        }
        let broker_order_id = execution.broker_order_id.clone().ok_or_else(|| {
            CoreError::validation("broker_order_id", format!("order {id} was never accepted by the broker"))
        })?;

        let gateway = self.gateway()?;
        if !gateway.capabilities().supports(BrokerCapability::OrderModification) {
            return Err(CoreError::Unsupported {
                message: format!("{} does not support order modification", self.broker),
            });
        }

        let request = ModifyOrderRequest {
            broker_order_id,
            quantity: command.quantity,
            limit_price: command.limit_price,
            stop_price: command.stop_price,
        };
        let report = gateway
            .modify_order(&request)
            .await
            .map_err(|e| CoreError::order("modify order", &e))?;

        let before = execution.clone();
        if let Some(quantity) = command.quantity {
            execution.quantity = quantity;
        }
        if command.limit_price.is_some() {
            execution.price = command.limit_price;
        }
        if command.stop_price.is_some() {
            execution.stop_price = command.stop_price;
        }
        let amended = execution != before;
        let (execution, _) = self
            .apply_broker_report(execution, &report, amended)
            .await?;
        tracing::info!(execution_id = %id, "Order modified");
        Ok(execution)
    }

    /// Stored orders matching the filter, newest first.
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Vec<OrderExecution>, CoreError> {
        Ok(self.orders.list(&filter).await?)
    }

    /// One stored order.
    pub async fn get_order(&self, id: ExecutionId) -> Result<OrderExecution, CoreError> {
        self.load(id).await
    }

    /// Publish a strategy signal on the setup's topic.
    pub async fn forward_signal(&self, setup_id: SetupId, payload: Value) -> DeliveryReport {
        self.notifier.forward_signal(setup_id, payload).await
    }

    async fn load(&self, id: ExecutionId) -> Result<OrderExecution, CoreError> {
        self.orders
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found("OrderExecution", id))
    }

    fn gateway(&self) -> Result<Arc<dyn BrokerGateway>, CoreError> {
        self.factory
            .get(self.broker)
            .map_err(|e| CoreError::connection("resolve gateway", &e))
    }

    async fn resolve_symbol(
        &self,
        command: &PlaceOrderCommand,
    ) -> Result<(String, Option<ContractId>), CoreError> {
        if let Some(setup_id) = command.setup_id {
            let setup = self
                .setups
                .find(setup_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Setup", setup_id))?;
            return Ok((setup.symbol, setup.contract_id));
        }
        match command.symbol.as_deref().map(str::trim) {
            Some(symbol) if !symbol.is_empty() => Ok((symbol.to_uppercase(), None)),
            _ => Err(CoreError::validation(
                "symbol",
                "required when no setup is given",
            )),
        }
    }

    /// Merge a broker report into a row; persists and publishes on change.
    /// `amended` marks a row the caller already changed.
    async fn apply_broker_report(
        &self,
        mut execution: OrderExecution,
        report: &BrokerOrder,
        amended: bool,
    ) -> Result<(OrderExecution, bool), CoreError> {
        let previous = execution.status;
        let mut changed = amended;

        if report.status != previous {
            if previous.can_transition_to(report.status) {
                execution.status = report.status;
                changed = true;
            } else {
                tracing::warn!(
                    execution_id = %execution.id,
                    from = %previous,
                    to = %report.status,
                    native = ?report.native_status,
                    "Ignoring backwards order status"
                );
            }
        }
        if report.filled_quantity != execution.filled_quantity
            && report.filled_quantity >= execution.filled_quantity
        {
            execution.filled_quantity = report.filled_quantity;
            changed = true;
        }
        if report.avg_fill_price.is_some() && report.avg_fill_price != execution.avg_fill_price {
            execution.avg_fill_price = report.avg_fill_price;
            changed = true;
        }

        if changed {
            execution.updated_at = Utc::now();
            self.orders.update(&execution).await?;
            self.notifier
                .order_status_changed(&execution, Some(previous))
                .await;
            tracing::info!(
                execution_id = %execution.id,
                from = %previous,
                to = %execution.status,
                filled = %execution.filled_quantity,
                "Order status updated"
            );
        }
        Ok((execution, changed))
    }
}

/// Status stored for a freshly accepted order.
///
/// A broker that has not yet acknowledged the order still yields
/// `submitted`; the row was handed over.
const fn initial_status(reported: OrderStatus) -> OrderStatus {
    match reported {
        OrderStatus::Pending => OrderStatus::Submitted,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_quantity() {
        let cmd = PlaceOrderCommand::market("AAPL", OrderAction::Buy, dec!(0));
        let Err(CoreError::Validation { field, .. }) = cmd.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(field, "quantity");
    }

    #[test]
    fn limit_requires_price() {
        let mut cmd = PlaceOrderCommand::limit("AAPL", OrderAction::Buy, dec!(10), dec!(150));
        assert!(cmd.validate().is_ok());
        cmd.limit_price = None;
        let Err(CoreError::Validation { field, .. }) = cmd.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(field, "limit_price");
    }

    #[test]
    fn stop_requires_stop_price() {
        let mut cmd = PlaceOrderCommand::market("AAPL", OrderAction::Sell, dec!(5));
        cmd.kind = OrderKind::Stop;
        let Err(CoreError::Validation { field, .. }) = cmd.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(field, "stop_price");

        cmd.stop_price = Some(dec!(140));
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn stop_limit_requires_both_prices() {
        let mut cmd = PlaceOrderCommand::market("AAPL", OrderAction::Sell, dec!(5));
        cmd.kind = OrderKind::StopLimit;
        cmd.stop_price = Some(dec!(140));
        assert!(cmd.validate().is_err());
        cmd.limit_price = Some(dec!(139.5));
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn pending_report_is_stored_as_submitted() {
        assert_eq!(initial_status(OrderStatus::Pending), OrderStatus::Submitted);
        assert_eq!(initial_status(OrderStatus::Filled), OrderStatus::Filled);
    }
}
