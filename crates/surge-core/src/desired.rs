//! Desired pool size: the quadruple a caller hands to the pool.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Target parameters for the connection pool.
///
/// Replaced wholesale on every update. Callers are expected to have
/// validated the values already; the pool trusts what it is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredAmount {
    /// Number of live connections to converge on.
    pub peers: u32,
    /// Milliseconds until the target decays to zero.
    pub timeout: u32,
    /// Max connection attempts in flight per burst. 0 = unlimited.
    pub burst: u32,
    /// Milliseconds to pause between bursts. Sign is not validated upstream,
    /// a negative pause sleeps for zero time.
    pub wait: i32,
}

impl DesiredAmount {
    pub fn new(peers: u32, timeout: u32, burst: u32, wait: i32) -> Self {
        Self {
            peers,
            timeout,
            burst,
            wait,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout))
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait.max(0) as u64)
    }

    /// Burst size, or `None` when bursting is disabled.
    pub fn burst(&self) -> Option<usize> {
        match self.burst {
            0 => None,
            n => Some(n as usize),
        }
    }
}
