//! Connection handles and the factory that produces them.
//!
//! A handle is an opaque capability: the pool can only ask it to terminate.
//! Everything else the pool learns about a connection arrives as
//! [`LifecycleEvent`]s on the channel returned alongside the handle.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Pool-local identity of a managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Closed set of notifications a connection emits.
#[derive(Debug)]
pub enum LifecycleEvent {
    /// Setup completed.
    Connected,
    /// The connection is gone, whether terminated or dropped by the peer.
    Disconnected,
    /// The connection failed. The pool treats this like `Disconnected`.
    Error(anyhow::Error),
}

/// Sending half of a connection's lifecycle channel.
pub type LifecycleSender = mpsc::UnboundedSender<LifecycleEvent>;

/// Receiving half of a connection's lifecycle channel.
pub type LifecycleReceiver = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Create a lifecycle channel for a new connection.
pub fn lifecycle_channel() -> (LifecycleSender, LifecycleReceiver) {
    mpsc::unbounded_channel()
}

/// One managed connection.
pub trait Connection: Send + Sync {
    /// Ask the connection to close. Implementations must eventually emit
    /// `Disconnected` (or drop their event sender).
    fn terminate(&self);
}

/// Shared reference to a managed connection.
pub type ConnectionRef = Arc<dyn Connection>;

/// A freshly created connection and its event stream.
pub struct NewConnection {
    pub handle: ConnectionRef,
    pub events: LifecycleReceiver,
}

impl NewConnection {
    pub fn new(handle: impl Connection + 'static, events: LifecycleReceiver) -> Self {
        Self {
            handle: Arc::new(handle),
            events,
        }
    }
}

/// Produces connections on demand.
///
/// `connect` must not block: it starts the attempt and returns immediately.
/// The outcome is reported through the returned event stream. An `Err` here
/// means the factory itself is broken, and is fatal to the reconciler.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> anyhow::Result<NewConnection>;
}
