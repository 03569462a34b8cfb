//! Interactive Brokers Gateway Adapter
//!
//! Implementation of `BrokerGateway` against the IB gateway HTTP service:
//! - Connection lifecycle with profile-scaled deadlines
//! - Retry with exponential backoff for idempotent reads
//! - Native order status reconciliation
//! - `EUR/USD` ⇄ `EUR.USD` symbol translation

mod adapter;
mod api_types;
mod error;
mod http_client;

pub use adapter::IbGatewayAdapter;
pub use api_types::canonical_status;
pub use error::IbGatewayError;
