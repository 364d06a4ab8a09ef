use crate::pool::PoolState;

/// Errors surfaced by the pool.
///
/// `Factory` and `Panicked` are loop-fatal: the reconciler stops and the
/// error is delivered to the pool's owner.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("connection factory failed: {0:#}")]
    Factory(anyhow::Error),
    #[error("reconciler task panicked: {0}")]
    Panicked(String),
    #[error("cannot start pool while {0}")]
    InvalidState(PoolState),
}
