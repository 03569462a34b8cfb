//! IB gateway adapter implementing `BrokerGateway`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use crate::application::ports::{
    AccountSummary, AdvancedContractSearch, BrokerCapability, BrokerError, BrokerGateway,
    BrokerOrder, BrokerOrderRequest, BrokerPosition, BrokerType, CapabilitySet, ConnectionStatus,
    ConnectionTestResult, ContractDetails, GatewayConnectionConfig, HealthReport, HistoricalBar,
    HistoricalDataRequest, Quote, symbols,
};
use crate::application::services::GatewaySettings;
use crate::domain::order_execution::OrderStatus;

use super::api_types::{
    IbAccountSummary, IbAdvancedSearchRequest, IbBar, IbCancelOrderRequest, IbConnectRequest,
    IbContract, IbContractSearchRequest, IbHealthResponse, IbOrder, IbOutcomeResponse,
    IbPlaceOrderRequest, IbPlaceOrderResponse, IbPosition, IbQuote, canonical_status,
    extract_list,
};
use super::error::IbGatewayError;
use super::http_client::IbHttpClient;

/// Interactive Brokers gateway adapter.
///
/// Talks to the IB gateway HTTP service. Remembers the parameters of the
/// last successful connect so quote and history calls can default the
/// account mode.
#[derive(Debug)]
pub struct IbGatewayAdapter {
    client: IbHttpClient,
    settings: GatewaySettings,
    session: RwLock<Option<GatewayConnectionConfig>>,
}

impl IbGatewayAdapter {
    /// Create a new adapter.
    pub fn new(settings: &GatewaySettings) -> Result<Self, IbGatewayError> {
        Ok(Self {
            client: IbHttpClient::new(settings)?,
            settings: settings.clone(),
            session: RwLock::new(None),
        })
    }

    fn connect_request(config: &GatewayConnectionConfig) -> IbConnectRequest {
        IbConnectRequest {
            host: config.host.clone(),
            port: config.port,
            client_id: config.client_id,
            timeout: config.timeout_seconds,
            connection_type: config.connection_kind,
            account_mode: config.account_mode,
        }
    }

    fn connect_deadline(&self, config: &GatewayConnectionConfig) -> Duration {
        self.settings.connect_timeout(config.timeout_seconds)
    }

    fn session_account_mode(&self) -> Option<String> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.account_mode.as_str().to_string())
    }

    async fn health(&self) -> Result<(IbHealthResponse, Value), IbGatewayError> {
        let raw: Value = self
            .client
            .get_once("health", "/health", self.settings.status_timeout())
            .await?;
        let parsed: IbHealthResponse = serde_json::from_value(raw.clone())
            .map_err(|e| IbGatewayError::JsonParse(e.to_string()))?;
        Ok((parsed, raw))
    }

    async fn search(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<Vec<ContractDetails>, BrokerError> {
        let raw: Value = self.client.post("contract_search", path, body, None).await?;
        let contracts: Vec<IbContract> = extract_list(raw, "contracts")?;
        Ok(contracts.into_iter().map(IbContract::into_details).collect())
    }
}

#[async_trait]
impl BrokerGateway for IbGatewayAdapter {
    fn broker_type(&self) -> BrokerType {
        BrokerType::Ibkr
    }

    fn capabilities(&self) -> CapabilitySet {
        [BrokerCapability::AdvancedContractSearch]
            .into_iter()
            .collect()
    }

    async fn connect(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionStatus, BrokerError> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = config.client_id,
            account_mode = %config.account_mode,
            "Connecting IB gateway"
        );

        let response: IbOutcomeResponse = self
            .client
            .post(
                "connect",
                "/connection/connect",
                &Self::connect_request(config),
                Some(self.connect_deadline(config)),
            )
            .await?;

        if !response.success {
            return Err(IbGatewayError::ConnectionRefused(response.reason("connect failed")).into());
        }

        *self.session.write() = Some(config.clone());
        Ok(ConnectionStatus {
            connected: true,
            host: Some(config.host.clone()),
            port: Some(config.port),
            client_id: Some(config.client_id),
            account_mode: Some(config.account_mode),
            last_error: None,
        })
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        let response: IbOutcomeResponse = self
            .client
            .post("disconnect", "/connection/disconnect", &json!({}), None)
            .await?;
        *self.session.write() = None;
        if !response.success && response.error.is_some() {
            return Err(IbGatewayError::ConnectionRefused(response.reason("disconnect failed")).into());
        }
        Ok(())
    }

    async fn connection_status(&self) -> Result<ConnectionStatus, BrokerError> {
        let (health, _) = self.health().await?;
        let state = health.connection.ib_gateway;
        Ok(ConnectionStatus {
            connected: state.connected,
            host: state.host,
            port: state.port,
            client_id: state.client_id,
            account_mode: state.account_mode,
            last_error: state.last_error,
        })
    }

    async fn test_connection(
        &self,
        config: &GatewayConnectionConfig,
    ) -> Result<ConnectionTestResult, BrokerError> {
        let raw: Value = self
            .client
            .post(
                "test_connection",
                "/connection/test",
                &Self::connect_request(config),
                Some(self.connect_deadline(config)),
            )
            .await?;
        let outcome: IbOutcomeResponse = serde_json::from_value(raw.clone())
            .map_err(|e| IbGatewayError::JsonParse(e.to_string()))?;

        Ok(ConnectionTestResult {
            success: outcome.success,
            message: outcome.reason(if outcome.success {
                "connection test succeeded"
            } else {
                "connection test failed"
            }),
            details: raw,
        })
    }

    async fn health_check(&self) -> Result<HealthReport, BrokerError> {
        let (health, raw) = self.health().await?;
        Ok(HealthReport {
            healthy: health.connection.ib_gateway.connected,
            details: raw,
        })
    }

    async fn account_summary(&self) -> Result<AccountSummary, BrokerError> {
        let raw: Value = self
            .client
            .get("account_summary", "/account/summary", &[])
            .await?;
        let parsed: IbAccountSummary = serde_json::from_value(raw.clone()).unwrap_or_default();
        Ok(parsed.into_summary(raw))
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let raw: Value = self
            .client
            .get("positions", "/account/positions", &[])
            .await?;
        let positions: Vec<IbPosition> = extract_list(raw, "positions")?;
        Ok(positions.into_iter().map(IbPosition::into_position).collect())
    }

    async fn orders(&self) -> Result<Vec<BrokerOrder>, BrokerError> {
        let raw: Value = self.client.get("orders", "/account/orders", &[]).await?;
        let orders: Vec<IbOrder> = extract_list(raw, "orders")?;
        Ok(orders.into_iter().map(IbOrder::into_order).collect())
    }

    async fn place_order(&self, request: &BrokerOrderRequest) -> Result<BrokerOrder, BrokerError> {
        let body = IbPlaceOrderRequest {
            symbol: self.to_broker_symbol(&request.symbol),
            action: request.action,
            quantity: request.quantity,
            order_type: request.kind,
            limit_price: request.limit_price,
            stop_price: request.stop_price,
            time_in_force: request.time_in_force.to_string(),
            order_ref: request.client_order_id.clone(),
        };

        tracing::info!(
            client_order_id = ?request.client_order_id,
            symbol = %body.symbol,
            action = %request.action,
            order_type = %request.kind,
            quantity = %request.quantity,
            limit_price = ?request.limit_price,
            "Submitting order to IB gateway"
        );

        let response: IbPlaceOrderResponse = self
            .client
            .post("place_order", "/orders/place", &body, None)
            .await
            .map_err(|e| match e {
                IbGatewayError::Api { status, message } if (400..500).contains(&status) => {
                    IbGatewayError::OrderRejected(message)
                }
                other => other,
            })?;

        if !response.success {
            let reason = response
                .error
                .or(response.message)
                .unwrap_or_else(|| "order rejected".to_string());
            return Err(IbGatewayError::OrderRejected(reason).into());
        }
        let broker_order_id = response
            .order_id
            .map(super::api_types::Loose::into_string)
            .ok_or_else(|| BrokerError::InvalidResponse {
                message: "place order response has no order_id".to_string(),
            })?;

        let status = response.status.as_deref().map_or(OrderStatus::Submitted, |native| {
            canonical_status(native, Decimal::ZERO, request.quantity)
        });
        if status == OrderStatus::Rejected {
            return Err(IbGatewayError::OrderRejected(
                response
                    .message
                    .unwrap_or_else(|| format!("order {broker_order_id} inactive")),
            )
            .into());
        }

        let now = Utc::now();
        tracing::info!(broker_order_id = %broker_order_id, status = %status, "Order accepted");
        Ok(BrokerOrder {
            broker_order_id,
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            action: request.action,
            kind: request.kind,
            quantity: request.quantity,
            filled_quantity: Decimal::ZERO,
            remaining_quantity: request.quantity,
            avg_fill_price: None,
            status,
            native_status: response.status,
            submitted_at: Some(now),
            updated_at: Some(now),
        })
    }

    async fn cancel_order(&self, broker_order_id: &str) -> Result<bool, BrokerError> {
        tracing::info!(broker_order_id, "Cancelling order at IB gateway");
        let response: IbOutcomeResponse = self
            .client
            .post(
                "cancel_order",
                "/orders/cancel",
                &IbCancelOrderRequest {
                    order_id: broker_order_id.to_string(),
                },
                None,
            )
            .await
            .map_err(|e| match e {
                IbGatewayError::Api { status: 404, .. } => IbGatewayError::OrderNotFound {
                    order_id: broker_order_id.to_string(),
                },
                other => other,
            })?;
        Ok(response.success)
    }

    async fn order_status(&self, broker_order_id: &str) -> Result<Option<BrokerOrder>, BrokerError> {
        let orders = self.orders().await?;
        Ok(orders
            .into_iter()
            .find(|o| o.broker_order_id == broker_order_id))
    }

    async fn search_contracts(&self, symbol: &str) -> Result<Vec<ContractDetails>, BrokerError> {
        self.search(
            "/contract/search",
            &IbContractSearchRequest {
                symbol: self.to_broker_symbol(symbol),
            },
        )
        .await
    }

    async fn search_contracts_advanced(
        &self,
        search: &AdvancedContractSearch,
    ) -> Result<Vec<ContractDetails>, BrokerError> {
        // IB looks forex up by base currency plus quote currency
        let symbol = match search.symbol.split_once('/') {
            Some((base, _)) if symbols::is_currency_pair(&search.symbol) => base.to_string(),
            _ => self.to_broker_symbol(&search.symbol),
        };
        self.search(
            "/contract/advanced-search",
            &IbAdvancedSearchRequest {
                symbol,
                sec_type: search.sec_type.clone(),
                exchange: search.exchange.clone(),
                currency: search.currency.clone(),
            },
        )
        .await
    }

    async fn historical_data(
        &self,
        request: &HistoricalDataRequest,
    ) -> Result<Vec<HistoricalBar>, BrokerError> {
        let mut query: Vec<(&str, String)> = vec![
            ("symbol", self.to_broker_symbol(&request.symbol)),
            ("timeframe", request.timeframe.bar_size().to_string()),
            ("period", request.period.clone()),
        ];
        if let Some(start) = request.start_date {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = request.end_date {
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        if let Some(sec_type) = &request.sec_type {
            query.push(("secType", sec_type.clone()));
        }
        if let Some(exchange) = &request.exchange {
            query.push(("exchange", exchange.clone()));
        }
        if let Some(currency) = &request.currency {
            query.push(("currency", currency.clone()));
        }
        let account_mode = request
            .account_mode
            .map(|m| m.as_str().to_string())
            .or_else(|| self.session_account_mode());
        if let Some(mode) = account_mode {
            query.push(("account_mode", mode));
        }

        let raw: Value = self
            .client
            .get("historical_data", "/market-data/history", &query)
            .await?;
        let bars: Vec<IbBar> = extract_list(raw, "bars")?;
        tracing::debug!(
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            bars = bars.len(),
            "Historical data received"
        );
        Ok(bars.into_iter().map(IbBar::into_bar).collect())
    }

    async fn quote(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let mut query = vec![("symbol", self.to_broker_symbol(symbol))];
        if let Some(mode) = self.session_account_mode() {
            query.push(("account_mode", mode));
        }
        let quote: IbQuote = self
            .client
            .get("quote", "/market-data/realtime", &query)
            .await?;
        Ok(quote.into_quote(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::connection::{AccountMode, ConnectionKind};

    fn adapter() -> IbGatewayAdapter {
        IbGatewayAdapter::new(&GatewaySettings::with_base_url("http://127.0.0.1:1")).unwrap()
    }

    #[test]
    fn declares_advanced_search_only() {
        let caps = adapter().capabilities();
        assert!(caps.supports(BrokerCapability::AdvancedContractSearch));
        assert!(!caps.supports(BrokerCapability::OrderModification));
    }

    #[test]
    fn connect_deadline_adds_buffer() {
        let adapter = adapter();
        let config = GatewayConnectionConfig {
            host: "localhost".to_string(),
            port: 4002,
            client_id: 1,
            timeout_seconds: 30,
            connection_kind: ConnectionKind::Gateway,
            account_mode: AccountMode::Paper,
        };
        assert_eq!(adapter.connect_deadline(&config), Duration::from_secs(40));
    }

    #[test]
    fn symbols_round_trip_through_adapter() {
        let adapter = adapter();
        assert_eq!(adapter.to_broker_symbol("EUR/USD"), "EUR.USD");
        assert_eq!(adapter.to_canonical_symbol("EUR.USD"), "EUR/USD");
        assert_eq!(adapter.to_broker_symbol("AAPL"), "AAPL");
    }
}
