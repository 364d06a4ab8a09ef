//! Socket pool: owns the registry and desired state, and supervises the
//! reconciler task that drives one toward the other.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use surge_core::config::{MetricsConfig, SurgeConfig, MIN_TICK_INTERVAL};
use surge_core::DesiredAmount;

use crate::connection::{ConnectionFactory, ConnectionId};
use crate::desired::DesiredState;
use crate::error::PoolError;
use crate::metrics::MetricsReporter;
use crate::reconciler;
use crate::registry::{Registry, Snapshot};

/// Lifecycle of the reconciler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Never started.
    Idle,
    Running,
    /// Stop requested; the loop has not observed it yet or is draining.
    Stopping,
    Stopped,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PoolState::Idle => "idle",
            PoolState::Running => "running",
            PoolState::Stopping => "stopping",
            PoolState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Idle pause at the end of every tick.
    pub tick_interval: Duration,
    pub metric_names: MetricsConfig,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            metric_names: MetricsConfig::default(),
        }
    }
}

impl PoolOptions {
    pub fn from_config(config: &SurgeConfig) -> Self {
        Self {
            tick_interval: config.pool.tick_interval(),
            metric_names: config.metrics.clone(),
        }
    }
}

/// Receives errors that killed the reconciler. The owner decides whether to
/// restart the pool or shut the process down.
pub type FatalErrors = mpsc::UnboundedReceiver<PoolError>;

/// State shared between the pool handle, the reconciler and the per-connection
/// lifecycle watchers.
pub(crate) struct PoolInner {
    registry: Mutex<Registry>,
    desired: Mutex<DesiredState>,
    pub(crate) factory: Arc<dyn ConnectionFactory>,
    pub(crate) metrics: Arc<dyn MetricsReporter>,
    pub(crate) names: MetricsConfig,
    pub(crate) tick_interval: Duration,
    state: watch::Sender<PoolState>,
    fatal_tx: mpsc::UnboundedSender<PoolError>,
    next_id: AtomicU64,
}

impl PoolInner {
    // Critical sections never panic, so a poisoned lock still holds a
    // consistent value.
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn desired(&self) -> MutexGuard<'_, DesiredState> {
        self.desired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn desired_amount(&self) -> DesiredAmount {
        self.desired().amount()
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.state.borrow() == PoolState::Running
    }

    pub(crate) fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Publish the target gauge and log pool occupancy.
    pub(crate) fn refresh_metrics(&self) {
        let peers = self.desired_amount().peers;
        self.metrics.observe(&self.names.desired, &[], f64::from(peers));

        if peers > 0 {
            let (connected, live) = {
                let reg = self.registry();
                (reg.connected_len(), reg.live_len())
            };
            tracing::debug!(connected, live, desired = peers, "connected peers");
        }
    }

    /// Decay the target to zero once its deadline has passed.
    pub(crate) fn decay_if_expired(&self) {
        let decayed = self.desired().decay_if_expired(Instant::now());
        if let Some(previous) = decayed {
            if previous > 0 {
                tracing::info!(previous, "deadline passed, decaying target to zero");
            }
            self.refresh_metrics();
        }
    }
}

/// Handle to a pool of outbound connections. Cheap to clone.
#[derive(Clone)]
pub struct SocketPool {
    inner: Arc<PoolInner>,
}

impl SocketPool {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        metrics: Arc<dyn MetricsReporter>,
        options: PoolOptions,
    ) -> (Self, FatalErrors) {
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(PoolState::Idle);
        let inner = PoolInner {
            registry: Mutex::new(Registry::new()),
            desired: Mutex::new(DesiredState::new(Instant::now())),
            factory,
            metrics,
            names: options.metric_names,
            tick_interval: options.tick_interval.max(MIN_TICK_INTERVAL),
            state,
            fatal_tx,
            next_id: AtomicU64::new(0),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            fatal_rx,
        )
    }

    /// Spawn the reconciler. Must be called from within a tokio runtime.
    /// Fails unless the pool is idle or stopped.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut previous = PoolState::Idle;
        let started = self.inner.state.send_if_modified(|state| {
            previous = *state;
            match state {
                PoolState::Idle | PoolState::Stopped => {
                    *state = PoolState::Running;
                    true
                }
                _ => false,
            }
        });
        if !started {
            return Err(PoolError::InvalidState(previous));
        }

        tracing::info!(
            tick_ms = self.inner.tick_interval.as_millis() as u64,
            "socket pool starting"
        );
        self.spawn_reconciler();
        Ok(())
    }

    /// Request a cooperative stop. The loop notices at its next tick boundary,
    /// terminates every connected handle, and moves to `Stopped`.
    pub fn stop(&self) {
        let requested = self.inner.state.send_if_modified(|state| {
            if *state == PoolState::Running {
                *state = PoolState::Stopping;
                true
            } else {
                false
            }
        });
        if requested {
            tracing::info!("socket pool stop requested");
        }
    }

    /// Wait until the reconciler is not running or stopping.
    pub async fn stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx
            .wait_for(|s| !matches!(s, PoolState::Running | PoolState::Stopping))
            .await;
    }

    /// Resume reconciliation with the existing registry and target. Waits for
    /// an in-progress stop to finish first. A running pool is left alone.
    pub async fn restart(&self) -> Result<(), PoolError> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| *s != PoolState::Stopping).await;
        drop(rx);

        match self.start() {
            Err(PoolError::InvalidState(PoolState::Running)) => Ok(()),
            other => other,
        }
    }

    /// Replace the target. The deadline restarts now and the target gauge is
    /// refreshed immediately; the loop picks the change up on its next pass.
    pub fn set_desired_amount(&self, amount: DesiredAmount) {
        self.inner.desired().update(amount, Instant::now());
        tracing::info!(
            peers = amount.peers,
            timeout = amount.timeout,
            burst = amount.burst,
            wait = amount.wait,
            "desired amount updated"
        );
        self.inner.refresh_metrics();
    }

    pub fn desired(&self) -> DesiredAmount {
        self.inner.desired_amount()
    }

    /// Copy of every live handle.
    pub fn sockets(&self) -> Snapshot {
        self.inner.registry().live_snapshot()
    }

    /// Copy of the handles that completed connection setup.
    pub fn connected_sockets(&self) -> Snapshot {
        self.inner.registry().connected_snapshot()
    }

    pub fn state(&self) -> PoolState {
        *self.inner.state.borrow()
    }

    fn spawn_reconciler(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = tokio::spawn(reconciler::run(inner.clone())).await;
            let fatal = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(e) => Some(PoolError::Panicked(e.to_string())),
            };

            inner.state.send_replace(PoolState::Stopped);

            match fatal {
                None => tracing::info!("socket pool stopped"),
                Some(e) => {
                    tracing::error!(error = %e, "reconciler failed");
                    if inner.fatal_tx.send(e).is_err() {
                        tracing::warn!("no supervisor listening for reconciler failure");
                    }
                }
            }
        });
    }
}
