//! Broker Adapters
//!
//! Implementations of `BrokerGateway` and the factory wiring for the
//! built-in brokers.

pub mod ib_gateway;

use std::sync::Arc;

pub use ib_gateway::{IbGatewayAdapter, IbGatewayError};

use crate::application::ports::{BrokerError, BrokerGateway, BrokerType};
use crate::application::services::{BrokerGatewayFactory, GatewayConstructor, GatewaySettings};
use crate::config::BrokersConfig;

/// Constructor for the IB gateway adapter.
pub fn ib_gateway_constructor() -> GatewayConstructor {
    Arc::new(
        |settings: &GatewaySettings| -> Result<Arc<dyn BrokerGateway>, BrokerError> {
            let adapter = IbGatewayAdapter::new(settings).map_err(BrokerError::from)?;
            Ok(Arc::new(adapter))
        },
    )
}

/// Factory with every built-in adapter registered and configured.
///
/// `alpaca` and `schwab` settings are stored when present, but requesting
/// those brokers still fails with `NotImplemented`.
pub fn builtin_factory(config: &BrokersConfig) -> BrokerGatewayFactory {
    let factory = BrokerGatewayFactory::new();
    factory.register(BrokerType::Ibkr, ib_gateway_constructor());
    factory.configure(BrokerType::Ibkr, config.ibkr.clone());
    if let Some(settings) = &config.alpaca {
        factory.configure(BrokerType::Alpaca, settings.clone());
    }
    if let Some(settings) = &config.schwab {
        factory.configure(BrokerType::Schwab, settings.clone());
    }
    factory
}
