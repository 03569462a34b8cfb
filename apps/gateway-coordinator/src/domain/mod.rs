//! Domain Layer
//!
//! Entities, value objects and repository traits. Nothing in here performs
//! I/O; persistence and broker access are expressed as traits implemented in
//! the infrastructure layer.

pub mod connection;
pub mod market_data;
pub mod order_execution;
pub mod shared;
