//! Registry of live and connected handles.
//!
//! Invariant: `connected ⊆ live`. Handles that already had a termination
//! issued stay in `live` until their disconnect notification arrives, but are
//! excluded from the active count so they are never terminated twice.

use std::collections::{HashMap, HashSet};

use rand::seq::IteratorRandom;

use crate::connection::{ConnectionId, ConnectionRef};

/// Point-in-time copy of a registry set.
pub type Snapshot = HashMap<ConnectionId, ConnectionRef>;

/// Outcome of removing a handle from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    pub was_connected: bool,
}

#[derive(Default)]
pub struct Registry {
    live: HashMap<ConnectionId, ConnectionRef>,
    connected: HashSet<ConnectionId>,
    terminating: HashSet<ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnectionId, handle: ConnectionRef) {
        self.live.insert(id, handle);
    }

    /// Move a live handle into the connected set. Returns false if the handle
    /// is unknown or was already connected.
    pub fn promote(&mut self, id: ConnectionId) -> bool {
        if !self.live.contains_key(&id) {
            return false;
        }
        self.connected.insert(id)
    }

    /// Drop a handle from every set. `None` if it was not live.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Removed> {
        self.live.remove(&id)?;
        self.terminating.remove(&id);
        Some(Removed {
            was_connected: self.connected.remove(&id),
        })
    }

    /// Pick `count` arbitrary active handles and mark them terminating.
    /// The caller is responsible for invoking `terminate` on each.
    pub fn select_for_termination(&mut self, count: usize) -> Vec<(ConnectionId, ConnectionRef)> {
        if count == 0 {
            return Vec::new();
        }
        let chosen = self
            .live
            .keys()
            .filter(|id| !self.terminating.contains(id))
            .copied()
            .choose_multiple(&mut rand::thread_rng(), count);

        chosen
            .into_iter()
            .filter_map(|id| {
                self.terminating.insert(id);
                self.live.get(&id).map(|h| (id, h.clone()))
            })
            .collect()
    }

    /// Mark every connected handle terminating and hand them back.
    pub fn drain_connected(&mut self) -> Vec<(ConnectionId, ConnectionRef)> {
        let mut drained = Vec::with_capacity(self.connected.len());
        for id in &self.connected {
            if self.terminating.insert(*id) {
                if let Some(handle) = self.live.get(id) {
                    drained.push((*id, handle.clone()));
                }
            }
        }
        drained
    }

    /// Live handles that have not been asked to terminate.
    pub fn active_len(&self) -> usize {
        self.live.len() - self.terminating.len()
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn connected_len(&self) -> usize {
        self.connected.len()
    }

    pub fn terminating_len(&self) -> usize {
        self.terminating.len()
    }

    pub fn live_snapshot(&self) -> Snapshot {
        self.live.clone()
    }

    pub fn connected_snapshot(&self) -> Snapshot {
        self.connected
            .iter()
            .filter_map(|id| self.live.get(id).map(|h| (*id, h.clone())))
            .collect()
    }
}
