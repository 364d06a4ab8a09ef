//! Reconciler: the control loop that closes the gap between the live
//! connection count and the target.
//!
//! Each tick: shrink, grow (in bursts), check the deadline, idle. The loop
//! only looks at the stop flag between ticks; an in-flight burst always
//! finishes settling first.

use std::sync::Arc;

use crate::barrier::{SettleGuard, SettlementBarrier};
use crate::connection::{ConnectionId, LifecycleEvent, LifecycleReceiver, NewConnection};
use crate::error::PoolError;
use crate::pool::PoolInner;

/// Run until a stop is requested, then terminate every connected handle.
pub(crate) async fn run(inner: Arc<PoolInner>) -> Result<(), PoolError> {
    tracing::info!("reconciler running");

    while inner.is_running() {
        shrink(&inner);
        grow(&inner).await?;
        inner.decay_if_expired();
        tokio::time::sleep(inner.tick_interval).await;
    }

    drain(&inner);
    Ok(())
}

/// Terminate arbitrary handles until the active count fits the target.
fn shrink(inner: &PoolInner) {
    let peers = inner.desired_amount().peers as usize;
    let doomed = {
        let mut reg = inner.registry();
        let excess = reg.active_len().saturating_sub(peers);
        reg.select_for_termination(excess)
    };
    if doomed.is_empty() {
        return;
    }

    tracing::debug!(
        count = doomed.len(),
        desired = peers,
        "terminating excess connections"
    );
    for (id, handle) in doomed {
        tracing::trace!(%id, "terminate");
        handle.terminate();
    }
}

/// Create handles until the active count reaches the target.
///
/// With a burst size B, no more than B handles are ever awaiting their first
/// lifecycle notification: after B creations the loop waits for all of them
/// to settle, then pauses for the configured wait before the next burst.
async fn grow(inner: &Arc<PoolInner>) -> Result<(), PoolError> {
    let mut barrier = SettlementBarrier::new();
    let mut in_burst = 0usize;

    loop {
        let desired = inner.desired_amount();
        let active = inner.registry().active_len();
        if active >= desired.peers as usize {
            break;
        }

        let id = inner.next_id();
        let NewConnection { handle, events } =
            inner.factory.connect().map_err(PoolError::Factory)?;
        inner.registry().insert(id, handle);
        tokio::spawn(watch_lifecycle(inner.clone(), id, events, barrier.register()));
        in_burst += 1;

        if let Some(burst) = desired.burst() {
            if in_burst >= burst {
                tracing::debug!(
                    burst,
                    wait_ms = desired.wait,
                    "burst launched, waiting for settlement"
                );
                barrier.wait().await;
                barrier = SettlementBarrier::new();
                in_burst = 0;
                tokio::time::sleep(desired.wait()).await;
            }
        }
    }

    barrier.wait().await;
    Ok(())
}

/// Terminate every connected handle on the way out.
fn drain(inner: &PoolInner) {
    let handles = inner.registry().drain_connected();
    tracing::info!(
        count = handles.len(),
        "reconciler stopping, terminating connected peers"
    );
    for (_, handle) in handles {
        handle.terminate();
    }
}

/// Apply one connection's lifecycle notifications to the registry.
///
/// The settlement guard is released on the first notification of any kind.
/// `Error` is handled exactly like `Disconnected`; a closed event stream
/// counts as a disconnect too.
async fn watch_lifecycle(
    inner: Arc<PoolInner>,
    id: ConnectionId,
    mut events: LifecycleReceiver,
    settle: SettleGuard,
) {
    let mut settle = Some(settle);

    let reason = loop {
        match events.recv().await {
            Some(LifecycleEvent::Connected) => {
                let promoted = inner.registry().promote(id);
                if promoted {
                    inner.metrics.increment(&inner.names.connected, &[]);
                    inner.refresh_metrics();
                }
                drop(settle.take());
            }
            Some(LifecycleEvent::Disconnected) => break "disconnected",
            Some(LifecycleEvent::Error(e)) => {
                tracing::warn!(%id, error = %format!("{e:#}"), "connection error");
                break "error";
            }
            None => break "event stream closed",
        }
    };

    let removed = inner.registry().remove(id);
    if removed.is_some_and(|r| r.was_connected) {
        inner.metrics.decrement(&inner.names.connected, &[]);
    }
    inner.refresh_metrics();
    tracing::trace!(%id, reason, "connection removed");

    drop(settle);
}
