//! In-memory repository implementations.
//!
//! Used by the default binary wiring and by tests. Each store keeps its
//! state behind a single lock so every trait method is atomic.

mod market_data;
mod orders;
mod profiles;

pub use market_data::{InMemoryMarketDataRepository, InMemorySetupRepository};
pub use orders::InMemoryOrderExecutionRepository;
pub use profiles::InMemoryProfileRepository;
