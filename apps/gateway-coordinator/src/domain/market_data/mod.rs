//! Market Data Bounded Context
//!
//! Timeframes, OHLCV bars, instrument contracts, setups and the bookkeeping
//! for collection runs.

mod bar;
mod collection;
mod contract;
mod repository;
mod setup;
mod timeframe;

pub use bar::{OhlcvBar, parse_bar_time};
pub use collection::{CollectionResult, CollectionStats};
pub use contract::{Contract, NewContract};
pub use repository::{MarketDataRepository, SetupRepository};
pub use setup::Setup;
pub use timeframe::{Timeframe, TimeframeScale};
