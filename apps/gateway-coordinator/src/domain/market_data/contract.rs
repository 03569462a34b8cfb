//! Stored instrument contracts.

use serde::{Deserialize, Serialize};

use crate::domain::shared::ContractId;

/// Instrument contract as stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Row id.
    pub id: ContractId,
    /// Canonical symbol.
    pub symbol: String,
    /// Security type (`STK`, `CASH`, ...).
    pub sec_type: String,
    /// Routing exchange.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Broker's own contract id, when known.
    pub broker_contract_id: Option<i64>,
    /// Long name, when known.
    pub description: Option<String>,
}

/// Contract to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContract {
    /// Canonical symbol.
    pub symbol: String,
    /// Security type.
    pub sec_type: String,
    /// Routing exchange.
    pub exchange: String,
    /// Quote currency.
    pub currency: String,
    /// Broker contract id.
    pub broker_contract_id: Option<i64>,
    /// Long name.
    pub description: Option<String>,
}

impl NewContract {
    /// Infer the instrument class from the canonical symbol alone.
    ///
    /// `EUR/USD` is a forex pair on IDEALPRO quoted in USD; anything else
    /// is a SMART-routed USD stock.
    #[must_use]
    pub fn inferred(symbol: &str) -> Self {
        let symbol = symbol.trim().to_uppercase();
        match symbol.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => Self {
                currency: quote.to_string(),
                symbol,
                sec_type: "CASH".to_string(),
                exchange: "IDEALPRO".to_string(),
                broker_contract_id: None,
                description: None,
            },
            _ => Self {
                symbol,
                sec_type: "STK".to_string(),
                exchange: "SMART".to_string(),
                currency: "USD".to_string(),
                broker_contract_id: None,
                description: None,
            },
        }
    }

    /// Materialise the stored row.
    #[must_use]
    pub fn into_contract(self, id: ContractId) -> Contract {
        Contract {
            id,
            symbol: self.symbol,
            sec_type: self.sec_type,
            exchange: self.exchange,
            currency: self.currency,
            broker_contract_id: self.broker_contract_id,
            description: self.description,
        }
    }
}
