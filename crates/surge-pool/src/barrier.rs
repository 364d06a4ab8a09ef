//! Settlement barrier: a counting wait-group for one burst of connections.
//!
//! Every connection created during a burst holds a [`SettleGuard`]. The guard
//! is dropped on the connection's first lifecycle notification, and
//! [`SettlementBarrier::wait`] resolves once no guards remain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Default)]
struct Shared {
    pending: AtomicUsize,
    settled: Notify,
}

#[derive(Clone, Default)]
pub struct SettlementBarrier {
    shared: Arc<Shared>,
}

/// Outstanding settlement. Dropping it settles.
pub struct SettleGuard {
    shared: Arc<Shared>,
}

impl SettlementBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more unsettled connection.
    pub fn register(&self) -> SettleGuard {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        SettleGuard {
            shared: self.shared.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Wait until every registered guard has settled.
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.settled.notified();
            tokio::pin!(notified);
            // Register interest before checking so a release between the
            // check and the await is not lost.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if self.shared.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.settled.notify_waiters();
        }
    }
}
