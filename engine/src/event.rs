//! Events emitted for every commitment state change.

use commitclub_types::{AccountId, Amount, CommitId, Timestamp};

/// Observable commitment events. None of them carries the check-in passphrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClubEvent {
    CommitmentCreated {
        id: CommitId,
        organizer: AccountId,
        name: String,
        stake_amount: Amount,
        min_check_ins: u32,
        deadline: Timestamp,
    },
    Joined {
        id: CommitId,
        account: AccountId,
        at: Timestamp,
    },
    CheckedIn {
        id: CommitId,
        account: AccountId,
        at: Timestamp,
    },
    Settled {
        id: CommitId,
        attendee_count: u32,
        total_distributed: Amount,
    },
    /// A settlement transfer failed and became a liability.
    TransferFailed {
        id: CommitId,
        account: AccountId,
        amount: Amount,
    },
    /// A retried liability was delivered.
    LiabilityCleared {
        id: CommitId,
        account: AccountId,
        amount: Amount,
    },
}

/// Synchronous fan-out event bus.
///
/// Listeners are invoked inline on the emitting thread after the state change is
/// stored; keep handlers fast.
pub struct EventBus {
    listeners: Vec<Box<dyn Fn(&ClubEvent) + Send + Sync>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn Fn(&ClubEvent) + Send + Sync>) {
        self.listeners.push(listener);
    }

    pub fn emit(&self, event: &ClubEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
