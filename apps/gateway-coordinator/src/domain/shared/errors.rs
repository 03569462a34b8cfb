//! Errors reported by the relational store collaborator.

use thiserror::Error;

/// Error returned by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g. "ConnectionProfile").
        entity: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// A uniqueness or integrity rule rejected the write.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the violated rule.
        message: String,
    },

    /// Storage backend failure.
    #[error("Storage error: {message}")]
    Storage {
        /// Backend error message.
        message: String,
    },
}

impl RepositoryError {
    /// Shorthand for a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = RepositoryError::not_found("ConnectionProfile", 9);
        let msg = err.to_string();
        assert!(msg.contains("ConnectionProfile"));
        assert!(msg.contains('9'));
    }

    #[test]
    fn conflict_display() {
        let err = RepositoryError::conflict("duplicate name 'paper'");
        assert!(err.to_string().contains("duplicate name"));
    }
}
