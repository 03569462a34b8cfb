//! Broker gateway configuration.

use serde::{Deserialize, Serialize};

use crate::application::ports::{BrokerError, BrokerType};
use crate::application::services::GatewaySettings;

/// Broker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokersConfig {
    /// Broker used when a caller does not name one (`ibkr`, `alpaca`,
    /// `schwab`).
    #[serde(default = "default_broker")]
    pub default_broker: String,
    /// IB gateway service settings.
    #[serde(default)]
    pub ibkr: GatewaySettings,
    /// Alpaca settings, kept for when an adapter exists.
    #[serde(default)]
    pub alpaca: Option<GatewaySettings>,
    /// Schwab settings, kept for when an adapter exists.
    #[serde(default)]
    pub schwab: Option<GatewaySettings>,
}

impl BrokersConfig {
    /// Parsed default broker type.
    pub fn default_broker_type(&self) -> Result<BrokerType, BrokerError> {
        self.default_broker.parse()
    }

    /// Every configured broker with its settings.
    pub fn configured(&self) -> impl Iterator<Item = (BrokerType, &GatewaySettings)> {
        [
            (BrokerType::Ibkr, Some(&self.ibkr)),
            (BrokerType::Alpaca, self.alpaca.as_ref()),
            (BrokerType::Schwab, self.schwab.as_ref()),
        ]
        .into_iter()
        .filter_map(|(broker, settings)| settings.map(|s| (broker, s)))
    }
}

impl Default for BrokersConfig {
    fn default() -> Self {
        Self {
            default_broker: default_broker(),
            ibkr: GatewaySettings::default(),
            alpaca: None,
            schwab: None,
        }
    }
}

fn default_broker() -> String {
    BrokerType::Ibkr.as_str().to_string()
}
