//! HTTP API handlers: control and inspection of the socket pool.

pub mod metrics;
pub mod pool;

use std::sync::Arc;

use surge_pool::{PrometheusReporter, SocketPool};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SocketPool,
    /// Registry rendered at `/metrics`. Usually the same reporter the pool
    /// writes to.
    pub metrics: Arc<PrometheusReporter>,
}

// Re-export handler functions for use in router setup.
pub use metrics::handle_metrics;
pub use pool::{handle_pool_restart, handle_pool_set, handle_pool_status, handle_pool_stop};
