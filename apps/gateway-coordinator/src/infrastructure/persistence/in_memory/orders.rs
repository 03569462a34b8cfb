//! In-memory order execution repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::domain::order_execution::{
    NewOrderExecution, OrderExecution, OrderExecutionRepository, OrderFilter,
};
use crate::domain::shared::{ExecutionId, RepositoryError};

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<ExecutionId, OrderExecution>,
    next_id: i64,
}

/// In-memory implementation of `OrderExecutionRepository`.
///
/// Rows are keyed by id; ids are assigned in insertion order, which doubles
/// as the creation order for listing.
#[derive(Debug, Default)]
pub struct InMemoryOrderExecutionRepository {
    state: RwLock<State>,
}

impl InMemoryOrderExecutionRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Whether no row is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    /// Remove every row.
    pub fn clear(&self) {
        self.state.write().rows.clear();
    }
}

#[async_trait]
impl OrderExecutionRepository for InMemoryOrderExecutionRepository {
    async fn insert(
        &self,
        execution: NewOrderExecution,
    ) -> Result<OrderExecution, RepositoryError> {
        let mut state = self.state.write();
        if state
            .rows
            .values()
            .any(|row| row.client_order_id == execution.client_order_id)
        {
            return Err(RepositoryError::conflict(format!(
                "client order id '{}' already recorded",
                execution.client_order_id
            )));
        }
        state.next_id += 1;
        let id = ExecutionId::new(state.next_id);
        let stored = execution.into_execution(id, Utc::now());
        state.rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, execution: &OrderExecution) -> Result<(), RepositoryError> {
        let mut state = self.state.write();
        let row = state
            .rows
            .get_mut(&execution.id)
            .ok_or_else(|| RepositoryError::not_found("OrderExecution", execution.id))?;
        *row = execution.clone();
        Ok(())
    }

    async fn find(&self, id: ExecutionId) -> Result<Option<OrderExecution>, RepositoryError> {
        Ok(self.state.read().rows.get(&id).cloned())
    }

    async fn find_by_broker_order_id(
        &self,
        broker_order_id: &str,
    ) -> Result<Option<OrderExecution>, RepositoryError> {
        Ok(self
            .state
            .read()
            .rows
            .values()
            .find(|row| row.broker_order_id.as_deref() == Some(broker_order_id))
            .cloned())
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<OrderExecution>, RepositoryError> {
        Ok(self
            .state
            .read()
            .rows
            .values()
            .rev()
            .filter(|row| filter.matches(row))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn list_open(&self) -> Result<Vec<OrderExecution>, RepositoryError> {
        Ok(self
            .state
            .read()
            .rows
            .values()
            .filter(|row| row.is_open())
            .cloned()
            .collect())
    }
}
