//! Market data and setup repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::bar::OhlcvBar;
use super::contract::{Contract, NewContract};
use super::setup::Setup;
use super::timeframe::Timeframe;
use crate::domain::shared::{ContractId, RepositoryError, SetupId};

/// Storage for contracts and OHLCV bars.
#[async_trait]
pub trait MarketDataRepository: Send + Sync {
    /// Timestamp of the newest stored bar for a symbol and timeframe.
    async fn latest_bar_time(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    /// Find a contract by id.
    async fn find_contract(&self, id: ContractId) -> Result<Option<Contract>, RepositoryError>;

    /// Find a contract by canonical symbol.
    async fn find_contract_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Option<Contract>, RepositoryError>;

    /// Insert a contract.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the symbol already has a contract.
    async fn create_contract(&self, contract: NewContract) -> Result<Contract, RepositoryError>;

    /// Insert bars, skipping any whose timestamp is already stored for the
    /// same symbol and timeframe. Returns the number of rows newly inserted.
    async fn insert_bars(
        &self,
        contract_id: ContractId,
        bars: &[OhlcvBar],
    ) -> Result<usize, RepositoryError>;
}

/// Read access to setups.
#[async_trait]
pub trait SetupRepository: Send + Sync {
    /// Find a setup by id.
    async fn find(&self, id: SetupId) -> Result<Option<Setup>, RepositoryError>;

    /// Every active setup, ordered by id.
    async fn list_active(&self) -> Result<Vec<Setup>, RepositoryError>;
}
