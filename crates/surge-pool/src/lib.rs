//! surge-pool — drives a pool of outbound connections toward a target size.
//!
//! [`SocketPool`] owns the registry and desired state and supervises the
//! reconciler task. Transports plug in through [`ConnectionFactory`], metric
//! sinks through [`MetricsReporter`].

pub mod barrier;
pub mod connection;
pub mod desired;
pub mod error;
pub mod metrics;
pub mod pool;
mod reconciler;
pub mod registry;

pub use connection::{
    lifecycle_channel, Connection, ConnectionFactory, ConnectionId, ConnectionRef, LifecycleEvent,
    LifecycleReceiver, LifecycleSender, NewConnection,
};
pub use error::PoolError;
pub use metrics::{MetricsReporter, NoopReporter, PrometheusReporter};
pub use pool::{FatalErrors, PoolOptions, PoolState, SocketPool};
pub use registry::Snapshot;
pub use surge_core::DesiredAmount;
