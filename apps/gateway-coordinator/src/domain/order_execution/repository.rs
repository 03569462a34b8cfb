//! Order Execution Repository Trait
//!
//! Defines the persistence abstraction for order executions.
//! Implemented by adapters in the infrastructure layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::execution::{NewOrderExecution, OrderExecution};
use super::value_objects::OrderStatus;
use crate::domain::shared::{ExecutionId, RepositoryError, SetupId};

/// Filters for listing executions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    /// Only orders correlated with this setup.
    pub setup_id: Option<SetupId>,
    /// Only orders in this status.
    pub status: Option<OrderStatus>,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl OrderFilter {
    /// Whether an execution passes the setup and status filters.
    #[must_use]
    pub fn matches(&self, execution: &OrderExecution) -> bool {
        self.setup_id.is_none_or(|id| execution.setup_id == Some(id))
            && self.status.is_none_or(|status| execution.status == status)
    }
}

/// Repository trait for order executions.
#[async_trait]
pub trait OrderExecutionRepository: Send + Sync {
    /// Insert a new row.
    ///
    /// # Errors
    ///
    /// Returns error if persistence fails.
    async fn insert(&self, execution: NewOrderExecution) -> Result<OrderExecution, RepositoryError>;

    /// Replace a stored row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    async fn update(&self, execution: &OrderExecution) -> Result<(), RepositoryError>;

    /// Find by internal id.
    async fn find(&self, id: ExecutionId) -> Result<Option<OrderExecution>, RepositoryError>;

    /// Find by broker-assigned id.
    async fn find_by_broker_order_id(
        &self,
        broker_order_id: &str,
    ) -> Result<Option<OrderExecution>, RepositoryError>;

    /// List rows matching the filter, newest first.
    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderExecution>, RepositoryError>;

    /// Every non-terminal row, oldest first.
    async fn list_open(&self) -> Result<Vec<OrderExecution>, RepositoryError>;
}
