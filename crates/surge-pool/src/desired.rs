//! Desired-state controller: current target plus its decay deadline.

use tokio::time::Instant;

use surge_core::DesiredAmount;

#[derive(Debug, Clone)]
pub struct DesiredState {
    amount: DesiredAmount,
    deadline: Instant,
}

impl DesiredState {
    /// Empty target whose deadline has already passed.
    pub fn new(now: Instant) -> Self {
        Self {
            amount: DesiredAmount::default(),
            deadline: now,
        }
    }

    /// Replace the target and restart the deadline from `now`.
    pub fn update(&mut self, amount: DesiredAmount, now: Instant) {
        self.amount = amount;
        self.deadline = now + amount.timeout();
    }

    pub fn amount(&self) -> DesiredAmount {
        self.amount
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Force the peer target to zero once `now` is past the deadline.
    /// Returns the peer count that was in force, or `None` if the deadline
    /// has not passed yet.
    pub fn decay_if_expired(&mut self, now: Instant) -> Option<u32> {
        if now <= self.deadline {
            return None;
        }
        let previous = self.amount.peers;
        self.amount.peers = 0;
        Some(previous)
    }
}
