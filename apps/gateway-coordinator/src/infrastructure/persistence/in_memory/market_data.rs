//! In-memory contract, bar and setup stores.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::market_data::{
    Contract, MarketDataRepository, NewContract, OhlcvBar, Setup, SetupRepository, Timeframe,
};
use crate::domain::shared::{ContractId, RepositoryError, SetupId};

type SeriesKey = (String, Timeframe);

#[derive(Debug, Default)]
struct State {
    contracts: BTreeMap<ContractId, Contract>,
    next_contract_id: i64,
    series: HashMap<SeriesKey, BTreeMap<DateTime<Utc>, OhlcvBar>>,
}

/// In-memory implementation of `MarketDataRepository`.
///
/// Bars are unique per (symbol, timeframe, timestamp); re-inserting an
/// existing timestamp is a no-op.
#[derive(Debug, Default)]
pub struct InMemoryMarketDataRepository {
    state: RwLock<State>,
}

impl InMemoryMarketDataRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bars for a symbol and timeframe, oldest first.
    #[must_use]
    pub fn bars(&self, symbol: &str, timeframe: Timeframe) -> Vec<OhlcvBar> {
        self.state
            .read()
            .series
            .get(&(symbol.to_string(), timeframe))
            .map(|series| series.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored contracts.
    #[must_use]
    pub fn contract_count(&self) -> usize {
        self.state.read().contracts.len()
    }
}

#[async_trait]
impl MarketDataRepository for InMemoryMarketDataRepository {
    async fn latest_bar_time(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .state
            .read()
            .series
            .get(&(symbol.to_string(), timeframe))
            .and_then(|series| series.keys().next_back().copied()))
    }

    async fn find_contract(&self, id: ContractId) -> Result<Option<Contract>, RepositoryError> {
        Ok(self.state.read().contracts.get(&id).cloned())
    }

    async fn find_contract_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Option<Contract>, RepositoryError> {
        Ok(self
            .state
            .read()
            .contracts
            .values()
            .find(|c| c.symbol == symbol)
            .cloned())
    }

    async fn create_contract(&self, contract: NewContract) -> Result<Contract, RepositoryError> {
        let mut state = self.state.write();
        if state.contracts.values().any(|c| c.symbol == contract.symbol) {
            return Err(RepositoryError::conflict(format!(
                "contract for '{}' already exists",
                contract.symbol
            )));
        }
        state.next_contract_id += 1;
        let id = ContractId::new(state.next_contract_id);
        let created = contract.into_contract(id);
        state.contracts.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_bars(
        &self,
        contract_id: ContractId,
        bars: &[OhlcvBar],
    ) -> Result<usize, RepositoryError> {
        let mut state = self.state.write();
        if !state.contracts.contains_key(&contract_id) {
            return Err(RepositoryError::not_found("Contract", contract_id));
        }

        let mut inserted = 0;
        for bar in bars {
            let series = state
                .series
                .entry((bar.symbol.clone(), bar.timeframe))
                .or_default();
            if !series.contains_key(&bar.timestamp) {
                series.insert(bar.timestamp, bar.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// In-memory implementation of `SetupRepository`.
///
/// Setups are owned by another part of the application; this store is
/// seeded through [`Self::insert`].
#[derive(Debug, Default)]
pub struct InMemorySetupRepository {
    setups: RwLock<BTreeMap<SetupId, Setup>>,
}

impl InMemorySetupRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding the given setups.
    #[must_use]
    pub fn with_setups(setups: impl IntoIterator<Item = Setup>) -> Self {
        let repo = Self::new();
        for setup in setups {
            repo.insert(setup);
        }
        repo
    }

    /// Insert or replace a setup.
    pub fn insert(&self, setup: Setup) {
        self.setups.write().insert(setup.id, setup);
    }
}

#[async_trait]
impl SetupRepository for InMemorySetupRepository {
    async fn find(&self, id: SetupId) -> Result<Option<Setup>, RepositoryError> {
        Ok(self.setups.read().get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Setup>, RepositoryError> {
        Ok(self
            .setups
            .read()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect())
    }
}
