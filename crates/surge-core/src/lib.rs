//! surge-core — configuration and shared value types.
//! All other Surge crates depend on this one.

pub mod config;
pub mod desired;

pub use desired::DesiredAmount;
