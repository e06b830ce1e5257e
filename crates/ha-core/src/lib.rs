//! hapair core
//!
//! Shared types and error taxonomy for provisioning a two-node
//! load-balancer/failover pair.

pub mod error;
pub mod types;

pub use error::HaError;
pub use types::*;

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, HaError>;
