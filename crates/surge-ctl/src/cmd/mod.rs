//! CLI command modules.

pub mod http;
pub mod pool;
