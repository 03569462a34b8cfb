//! Shared kernel: identifiers and store errors used across bounded contexts.

mod errors;
mod identifiers;

pub use errors::RepositoryError;
pub use identifiers::{ContractId, ExecutionId, ProfileId, SetupId, SignalId};
