//! Order Execution Bounded Context
//!
//! Canonical order vocabulary and the persisted `OrderExecution` projection.

mod execution;
mod repository;
mod value_objects;

pub use execution::{NewOrderExecution, OrderExecution};
pub use repository::{OrderExecutionRepository, OrderFilter};
pub use value_objects::{OrderAction, OrderKind, OrderStatus, TimeInForce};
