//! Infrastructure Layer
//!
//! Adapters implementing the application ports: the IB gateway HTTP client,
//! in-memory repositories and event publishers.

pub mod broker;
pub mod events;
pub mod persistence;
