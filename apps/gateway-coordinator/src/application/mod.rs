//! Application Layer
//!
//! Ports the core depends on, services shared between use cases, and the
//! use cases exposed to the route layer.

pub mod ports;
pub mod services;
pub mod use_cases;
