//! Market Data Collection Use Case
//!
//! Fetches historical bars per setup and timeframe, skipping timeframes whose
//! newest stored bar is younger than the timeframe's refresh interval. A
//! failing timeframe or setup is recorded and never aborts the rest of a
//! bulk run.

use std::sync::Arc;

use chrono::Utc;

use crate::application::ports::{
    AdvancedContractSearch, BrokerCapability, BrokerGateway, BrokerType, ContractDetails,
    HistoricalBar, HistoricalDataRequest,
};
use crate::application::services::{BrokerGatewayFactory, CollectionPacing};
use crate::domain::market_data::{
    CollectionResult, CollectionStats, Contract, MarketDataRepository, NewContract, OhlcvBar,
    SetupRepository, Timeframe, parse_bar_time,
};
use crate::domain::shared::{ContractId, RepositoryError, SetupId};
use crate::error::CoreError;

/// Use case collecting OHLCV history into the market data store.
pub struct MarketDataCollector<M, S>
where
    M: MarketDataRepository,
    S: SetupRepository,
{
    market_data: Arc<M>,
    setups: Arc<S>,
    factory: Arc<BrokerGatewayFactory>,
    broker: BrokerType,
    pacing: CollectionPacing,
}

impl<M, S> MarketDataCollector<M, S>
where
    M: MarketDataRepository,
    S: SetupRepository,
{
    /// Create a new collector.
    pub const fn new(
        market_data: Arc<M>,
        setups: Arc<S>,
        factory: Arc<BrokerGatewayFactory>,
        broker: BrokerType,
        pacing: CollectionPacing,
    ) -> Self {
        Self {
            market_data,
            setups,
            factory,
            broker,
            pacing,
        }
    }

    /// Collect one symbol and timeframe.
    ///
    /// Never fails: problems are reported as an unsuccessful result.
    pub async fn collect_data_for_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        contract_id: Option<ContractId>,
    ) -> CollectionResult {
        match self.try_collect(symbol, timeframe, contract_id).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(symbol, timeframe = %timeframe, error = %e, "Collection failed");
                CollectionResult::failed(symbol, timeframe, e.to_string())
            }
        }
    }

    /// Collect every timeframe of one setup, in configured order.
    pub async fn collect_for_setup(&self, setup_id: SetupId) -> Result<CollectionStats, CoreError> {
        let setup = self
            .setups
            .find(setup_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Setup", setup_id))?;

        let mut stats = CollectionStats {
            setups_processed: 1,
            ..CollectionStats::default()
        };

        for (i, timeframe) in setup.timeframes.iter().copied().enumerate() {
            if i > 0 {
                self.pacing.pause_between_timeframes().await;
            }
            let result = self
                .collect_data_for_timeframe(&setup.symbol, timeframe, setup.contract_id)
                .await;
            stats.record(result);
        }

        tracing::info!(
            setup_id = %setup_id,
            symbol = %setup.symbol,
            successful = stats.successful,
            failed = stats.failed,
            records = stats.records_collected,
            "Setup collection finished"
        );
        Ok(stats)
    }

    /// Collect every active setup, pausing between setups.
    pub async fn collect_for_all_active_setups(&self) -> Result<CollectionStats, CoreError> {
        let setups = self.setups.list_active().await?;
        let mut stats = CollectionStats::default();

        for (i, setup) in setups.iter().enumerate() {
            if i > 0 {
                self.pacing.pause_between_setups().await;
            }
            match self.collect_for_setup(setup.id).await {
                Ok(setup_stats) => stats.merge(setup_stats),
                Err(e) => {
                    tracing::warn!(setup_id = %setup.id, error = %e, "Setup collection failed");
                    stats.record_setup_failure(setup.id, e.to_string());
                }
            }
        }

        tracing::info!(
            setups = stats.setups_processed,
            setups_failed = stats.setups_failed,
            successful = stats.successful,
            failed = stats.failed,
            records = stats.records_collected,
            "Bulk collection finished"
        );
        Ok(stats)
    }

    async fn try_collect(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        contract_id: Option<ContractId>,
    ) -> Result<CollectionResult, CoreError> {
        // 1. Staleness check against the newest stored bar
        if let Some(latest) = self.market_data.latest_bar_time(symbol, timeframe).await?
            && Utc::now() - latest < timeframe.refresh_interval()
        {
            tracing::debug!(symbol, timeframe = %timeframe, %latest, "Stored data is fresh");
            return Ok(CollectionResult::up_to_date(symbol, timeframe));
        }

        // 2. Fetch history, qualified by the stored contract when there is one
        let gateway = self
            .factory
            .get(self.broker)
            .map_err(|e| CoreError::connection("resolve gateway", &e))?;
        let known = self.find_contract(symbol, contract_id).await?;
        let request = match &known {
            Some(contract) => HistoricalDataRequest::for_timeframe(symbol, timeframe)
                .with_contract(contract),
            None => {
                let inferred = NewContract::inferred(symbol);
                HistoricalDataRequest {
                    sec_type: Some(inferred.sec_type),
                    exchange: Some(inferred.exchange),
                    currency: Some(inferred.currency),
                    ..HistoricalDataRequest::for_timeframe(symbol, timeframe)
                }
            }
        };
        let raw = gateway
            .historical_data(&request)
            .await
            .map_err(|e| CoreError::connection("historical data", &e))?;
        if raw.is_empty() {
            return Ok(CollectionResult::failed(symbol, timeframe, "no data received"));
        }

        // 3. Resolve or create the contract
        let contract = match known {
            Some(contract) => contract,
            None => self.create_contract(gateway.as_ref(), symbol).await?,
        };

        // 4. Convert and store
        let bars = to_ohlcv(symbol, timeframe, &raw);
        if bars.is_empty() {
            return Ok(CollectionResult::failed(
                symbol,
                timeframe,
                "no bars with a readable time",
            ));
        }
        let inserted = self.market_data.insert_bars(contract.id, &bars).await?;

        tracing::info!(
            symbol,
            timeframe = %timeframe,
            received = raw.len(),
            inserted,
            "Historical bars stored"
        );
        Ok(CollectionResult::collected(symbol, timeframe, inserted))
    }

    async fn find_contract(
        &self,
        symbol: &str,
        contract_id: Option<ContractId>,
    ) -> Result<Option<Contract>, RepositoryError> {
        if let Some(id) = contract_id
            && let Some(contract) = self.market_data.find_contract(id).await?
        {
            return Ok(Some(contract));
        }
        self.market_data.find_contract_by_symbol(symbol).await
    }

    /// Search the broker for the contract and store it. Falls back to the
    /// contract inferred from the symbol when the search yields nothing.
    async fn create_contract(
        &self,
        gateway: &dyn BrokerGateway,
        symbol: &str,
    ) -> Result<Contract, CoreError> {
        let inferred = NewContract::inferred(symbol);
        let found = if gateway
            .capabilities()
            .supports(BrokerCapability::AdvancedContractSearch)
        {
            gateway
                .search_contracts_advanced(&AdvancedContractSearch {
                    symbol: inferred.symbol.clone(),
                    sec_type: Some(inferred.sec_type.clone()),
                    exchange: Some(inferred.exchange.clone()),
                    currency: Some(inferred.currency.clone()),
                })
                .await
        } else {
            gateway.search_contracts(&inferred.symbol).await
        };

        let new = match found {
            Ok(details) => best_match(&inferred.symbol, details)
                .map_or_else(|| inferred.clone(), |d| from_details(&inferred, d)),
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Contract search failed, using inferred contract");
                inferred
            }
        };

        match self.market_data.create_contract(new).await {
            Ok(contract) => {
                tracing::info!(symbol, contract_id = %contract.id, "Contract created");
                Ok(contract)
            }
            // created concurrently
            Err(RepositoryError::Conflict { .. }) => self
                .market_data
                .find_contract_by_symbol(symbol)
                .await?
                .ok_or_else(|| CoreError::Internal {
                    message: format!("contract for {symbol} vanished after conflict"),
                }),
            Err(e) => Err(e.into()),
        }
    }
}

fn best_match(symbol: &str, details: Vec<ContractDetails>) -> Option<ContractDetails> {
    let mut details = details.into_iter();
    let first = details.next()?;
    if first.symbol.eq_ignore_ascii_case(symbol) {
        return Some(first);
    }
    details
        .find(|d| d.symbol.eq_ignore_ascii_case(symbol))
        .or(Some(first))
}

fn from_details(inferred: &NewContract, details: ContractDetails) -> NewContract {
    let or_inferred = |value: String, fallback: &str| {
        if value.trim().is_empty() {
            fallback.to_string()
        } else {
            value
        }
    };
    NewContract {
        symbol: inferred.symbol.clone(),
        sec_type: or_inferred(details.sec_type, &inferred.sec_type),
        exchange: or_inferred(details.exchange, &inferred.exchange),
        currency: or_inferred(details.currency, &inferred.currency),
        broker_contract_id: details.broker_contract_id,
        description: details.description,
    }
}

fn to_ohlcv(symbol: &str, timeframe: Timeframe, raw: &[HistoricalBar]) -> Vec<OhlcvBar> {
    let mut skipped = 0usize;
    let bars: Vec<OhlcvBar> = raw
        .iter()
        .filter_map(|bar| {
            let Some(timestamp) = parse_bar_time(&bar.time) else {
                skipped += 1;
                return None;
            };
            Some(OhlcvBar {
                symbol: symbol.to_string(),
                timeframe,
                timestamp,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            })
        })
        .collect();
    if skipped > 0 {
        tracing::warn!(symbol, timeframe = %timeframe, skipped, "Skipped bars with unreadable time");
    }
    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn details(symbol: &str, exchange: &str) -> ContractDetails {
        ContractDetails {
            broker_contract_id: Some(265_598),
            symbol: symbol.to_string(),
            sec_type: "STK".to_string(),
            exchange: exchange.to_string(),
            currency: "USD".to_string(),
            description: None,
        }
    }

    #[test]
    fn best_match_prefers_exact_symbol() {
        let picked = best_match(
            "AAPL",
            vec![details("AAPL.MX", "MEXI"), details("AAPL", "NASDAQ")],
        )
        .unwrap();
        assert_eq!(picked.exchange, "NASDAQ");
        assert!(best_match("AAPL", Vec::new()).is_none());
    }

    #[test]
    fn details_fill_gaps_from_inference() {
        let inferred = NewContract::inferred("EUR/USD");
        let mut d = details("EUR.USD", "");
        d.sec_type = "CASH".to_string();
        let contract = from_details(&inferred, d);
        assert_eq!(contract.symbol, "EUR/USD");
        assert_eq!(contract.exchange, "IDEALPRO");
        assert_eq!(contract.broker_contract_id, Some(265_598));
    }

    #[test]
    fn unreadable_bar_times_are_dropped() {
        let raw = vec![
            HistoricalBar {
                time: "20240102 15:30:00".to_string(),
                open: dec!(1),
                high: dec!(2),
                low: dec!(0.5),
                close: dec!(1.5),
                volume: dec!(100),
            },
            HistoricalBar {
                time: "yesterday".to_string(),
                open: dec!(1),
                high: dec!(2),
                low: dec!(0.5),
                close: dec!(1.5),
                volume: dec!(100),
            },
        ];
        let bars = to_ohlcv("AAPL", Timeframe::OneHour, &raw);
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(1.5));
    }
}
