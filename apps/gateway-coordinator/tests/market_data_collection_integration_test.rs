//! Market-data collection integration tests.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use test_case::test_case;

use common::{Call, ScriptedGateway, daily_bar, factory_with};
use gateway_coordinator::application::ports::{BrokerCapability, BrokerError, ContractDetails};
use gateway_coordinator::application::services::CollectionPacing;
use gateway_coordinator::domain::market_data::NewContract;
use gateway_coordinator::{
    BrokerType, ContractId, InMemoryMarketDataRepository, InMemorySetupRepository,
    MarketDataCollector, MarketDataRepository, OhlcvBar, Setup, SetupId, Timeframe,
};

type Collector = MarketDataCollector<InMemoryMarketDataRepository, InMemorySetupRepository>;

struct Harness {
    collector: Collector,
    gateway: Arc<ScriptedGateway>,
    market_data: Arc<InMemoryMarketDataRepository>,
}

fn harness_with(gateway: Arc<ScriptedGateway>, setups: Vec<Setup>) -> Harness {
    let market_data = Arc::new(InMemoryMarketDataRepository::new());
    let collector = MarketDataCollector::new(
        Arc::clone(&market_data),
        Arc::new(InMemorySetupRepository::with_setups(setups)),
        factory_with(&gateway),
        BrokerType::Ibkr,
        CollectionPacing::none(),
    );
    Harness {
        collector,
        gateway,
        market_data,
    }
}

fn harness() -> Harness {
    harness_with(ScriptedGateway::new(), Vec::new())
}

fn setup(id: i64, symbol: &str, timeframes: Vec<Timeframe>) -> Setup {
    Setup {
        id: SetupId::new(id),
        name: format!("setup {id}"),
        symbol: symbol.to_string(),
        contract_id: None,
        timeframes,
        is_active: true,
    }
}

fn january_bars() -> Vec<gateway_coordinator::application::ports::HistoricalBar> {
    vec![
        daily_bar("20240102", dec!(185.64)),
        daily_bar("20240103", dec!(184.25)),
        daily_bar("20240104", dec!(181.91)),
    ]
}

async fn store_bar_aged(
    market_data: &InMemoryMarketDataRepository,
    symbol: &str,
    timeframe: Timeframe,
    age: Duration,
) -> ContractId {
    let contract = market_data
        .create_contract(NewContract::inferred(symbol))
        .await
        .unwrap();
    let bar = OhlcvBar {
        symbol: symbol.to_string(),
        timeframe,
        timestamp: Utc::now() - age,
        open: dec!(1),
        high: dec!(1),
        low: dec!(1),
        close: dec!(1),
        volume: dec!(1),
    };
    market_data.insert_bars(contract.id, &[bar]).await.unwrap();
    contract.id
}

fn history_calls(gateway: &ScriptedGateway) -> usize {
    gateway.count(|c| matches!(c, Call::HistoricalData(_)))
}

// =============================================================================
// Single timeframe
// =============================================================================

#[tokio::test]
async fn collects_and_creates_contract() {
    let h = harness();
    h.gateway.push_history(Ok(january_bars()));
    h.gateway.push_search(Ok(vec![ContractDetails {
        broker_contract_id: Some(265_598),
        symbol: "AAPL".to_string(),
        sec_type: "STK".to_string(),
        exchange: "SMART".to_string(),
        currency: "USD".to_string(),
        description: Some("APPLE INC".to_string()),
    }]));

    let result = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneDay, None)
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.records_collected, 3);
    assert_eq!(h.market_data.bars("AAPL", Timeframe::OneDay).len(), 3);

    let contract = h
        .market_data
        .find_contract_by_symbol("AAPL")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contract.broker_contract_id, Some(265_598));
    assert_eq!(contract.description.as_deref(), Some("APPLE INC"));

    let request = h
        .gateway
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::HistoricalData(request) => Some(request),
            _ => None,
        })
        .unwrap();
    assert_eq!(request.timeframe, Timeframe::OneDay);
    assert_eq!(request.period, "1Y");
    assert_eq!(request.sec_type.as_deref(), Some("STK"));
    assert!(
        h.gateway
            .calls()
            .contains(&Call::SearchContracts("AAPL".to_string()))
    );
}

#[tokio::test]
async fn advanced_search_is_used_when_supported() {
    let h = harness_with(
        ScriptedGateway::with_capabilities(&[BrokerCapability::AdvancedContractSearch]),
        Vec::new(),
    );
    h.gateway.push_history(Ok(january_bars()));
    h.gateway.push_search_advanced(Ok(vec![ContractDetails {
        broker_contract_id: Some(12_087_792),
        symbol: "EUR/USD".to_string(),
        sec_type: "CASH".to_string(),
        exchange: "IDEALPRO".to_string(),
        currency: "USD".to_string(),
        description: None,
    }]));

    let result = h
        .collector
        .collect_data_for_timeframe("EUR/USD", Timeframe::OneDay, None)
        .await;
    assert!(result.success, "{result:?}");

    let query = h
        .gateway
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::SearchContractsAdvanced(query) => Some(query),
            _ => None,
        })
        .unwrap();
    assert_eq!(query.symbol, "EUR/USD");
    assert_eq!(query.sec_type.as_deref(), Some("CASH"));
    assert_eq!(query.exchange.as_deref(), Some("IDEALPRO"));
    assert_eq!(h.gateway.count(|c| matches!(c, Call::SearchContracts(_))), 0);

    let contract = h
        .market_data
        .find_contract_by_symbol("EUR/USD")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contract.broker_contract_id, Some(12_087_792));
}

#[tokio::test]
async fn failed_search_falls_back_to_inferred_contract() {
    let h = harness();
    h.gateway.push_history(Ok(january_bars()));
    h.gateway.push_search(Err(BrokerError::Connection {
        message: "search unavailable".to_string(),
    }));

    let result = h
        .collector
        .collect_data_for_timeframe("MSFT", Timeframe::OneDay, None)
        .await;

    assert!(result.success, "{result:?}");
    let contract = h
        .market_data
        .find_contract_by_symbol("MSFT")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(contract.sec_type, "STK");
    assert!(contract.broker_contract_id.is_none());
}

#[tokio::test]
async fn empty_history_is_a_failed_result() {
    let h = harness();
    h.gateway.push_history(Ok(Vec::new()));

    let result = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneHour, None)
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("no data received"));
    assert_eq!(h.market_data.contract_count(), 0);
}

#[tokio::test]
async fn gateway_error_is_a_failed_result() {
    let h = harness();
    h.gateway.push_history(Err(BrokerError::Api {
        status: 502,
        message: "upstream unavailable".to_string(),
    }));

    let result = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneDay, None)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("upstream unavailable"));
}

#[tokio::test]
async fn unreadable_bar_times_are_skipped() {
    let h = harness();
    let mut bars = january_bars();
    bars.push(daily_bar("not a time", dec!(1)));
    h.gateway.push_history(Ok(bars));

    let result = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneDay, None)
        .await;

    assert!(result.success);
    assert_eq!(result.records_collected, 3);
}

#[tokio::test]
async fn recollecting_the_same_bars_inserts_nothing() {
    let h = harness();
    h.gateway.push_history(Ok(january_bars()));
    h.gateway.push_history(Ok(january_bars()));

    let first = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneDay, None)
        .await;
    let second = h
        .collector
        .collect_data_for_timeframe("AAPL", Timeframe::OneDay, None)
        .await;

    assert_eq!(first.records_collected, 3);
    assert!(second.success);
    assert_eq!(second.records_collected, 0);
    assert_eq!(h.market_data.bars("AAPL", Timeframe::OneDay).len(), 3);
    assert_eq!(h.market_data.contract_count(), 1);
}

#[test_case(Timeframe::FiveMinutes, 4, true ; "sub-hour fresh")]
#[test_case(Timeframe::FiveMinutes, 6, false ; "sub-hour stale")]
#[test_case(Timeframe::FourHours, 59, true ; "hour fresh")]
#[test_case(Timeframe::OneHour, 61, false ; "hour stale")]
#[test_case(Timeframe::OneDay, 1439, true ; "day fresh")]
#[test_case(Timeframe::OneDay, 1441, false ; "day stale")]
#[tokio::test]
async fn staleness_follows_timeframe_scale(timeframe: Timeframe, age_minutes: i64, fresh: bool) {
    let h = harness();
    let contract_id = store_bar_aged(
        &h.market_data,
        "AAPL",
        timeframe,
        Duration::minutes(age_minutes),
    )
    .await;
    h.gateway.push_history(Ok(january_bars()));

    let result = h
        .collector
        .collect_data_for_timeframe("AAPL", timeframe, Some(contract_id))
        .await;

    assert!(result.success, "{result:?}");
    if fresh {
        assert_eq!(history_calls(&h.gateway), 0);
        assert!(result.note.is_some());
    } else {
        assert_eq!(history_calls(&h.gateway), 1);
        // known contract is reused
        assert_eq!(h.gateway.count(|c| matches!(c, Call::SearchContracts(_))), 0);
    }
}

// =============================================================================
// Setups
// =============================================================================

#[tokio::test]
async fn setup_collects_each_timeframe_in_order() {
    let h = harness_with(
        ScriptedGateway::new(),
        vec![setup(1, "AAPL", vec![Timeframe::OneDay, Timeframe::OneHour])],
    );
    h.gateway.push_history(Ok(january_bars()));
    h.gateway.push_history(Ok(Vec::new()));

    let stats = h.collector.collect_for_setup(SetupId::new(1)).await.unwrap();

    assert_eq!(stats.setups_processed, 1);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.records_collected, 3);
    let timeframes: Vec<_> = stats.results.iter().map(|r| r.timeframe).collect();
    assert_eq!(timeframes, vec![Timeframe::OneDay, Timeframe::OneHour]);
}

#[tokio::test]
async fn unknown_setup_is_an_error() {
    let h = harness();
    assert!(h.collector.collect_for_setup(SetupId::new(5)).await.is_err());
}

#[tokio::test]
async fn bulk_collection_continues_past_failures() {
    let mut paused = setup(3, "TSLA", vec![Timeframe::OneDay]);
    paused.is_active = false;
    let h = harness_with(
        ScriptedGateway::new(),
        vec![
            setup(1, "AAPL", vec![Timeframe::OneDay]),
            setup(2, "MSFT", vec![Timeframe::OneDay]),
            paused,
        ],
    );
    h.gateway.push_history(Err(BrokerError::Connection {
        message: "pacing violation".to_string(),
    }));
    h.gateway.push_history(Ok(january_bars()));

    let stats = h.collector.collect_for_all_active_setups().await.unwrap();

    assert_eq!(stats.setups_processed, 2);
    assert_eq!(stats.setups_failed, 0);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(h.market_data.bars("MSFT", Timeframe::OneDay).len(), 3);
    assert!(h.market_data.bars("AAPL", Timeframe::OneDay).is_empty());
    assert_eq!(history_calls(&h.gateway), 2);
}
