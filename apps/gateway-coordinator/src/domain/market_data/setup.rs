//! Trading setups as seen by data collection and order correlation.

use serde::{Deserialize, Serialize};

use super::timeframe::Timeframe;
use crate::domain::shared::{ContractId, SetupId};

/// A user-defined combination of instrument and timeframes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    /// Row id.
    pub id: SetupId,
    /// Display name.
    pub name: String,
    /// Canonical symbol.
    pub symbol: String,
    /// Stored contract, when already resolved.
    pub contract_id: Option<ContractId>,
    /// Timeframes to collect, in order.
    pub timeframes: Vec<Timeframe>,
    /// Included in bulk collection.
    pub is_active: bool,
}
