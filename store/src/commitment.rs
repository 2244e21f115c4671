//! Commitment records and their storage trait.

use crate::StoreError;
use commitclub_types::{AccountId, Amount, CodeHash, CommitId, Timestamp};
use serde::{Deserialize, Serialize};

/// One staking pool: parameters fixed at creation plus the participation state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub id: CommitId,
    pub organizer: AccountId,
    pub name: String,
    /// Exact deposit every joiner must make.
    pub stake_amount: Amount,
    pub min_check_ins: u32,
    /// Settlement becomes legal once `now >= deadline`.
    pub deadline: Timestamp,
    pub code_hash: CodeHash,
    /// Accounts that deposited, in join order.
    pub joiners: Vec<AccountId>,
    /// Joiners that checked in, in check-in order.
    pub attendees: Vec<AccountId>,
    /// Sum of all deposits. Kept after settlement as the historical pool size.
    pub total_staked: Amount,
    pub settled: bool,
    pub created_at: Timestamp,
    /// Written in the same update that sets `settled`.
    pub settlement: Option<SettlementRecord>,
}

impl Commitment {
    pub fn is_joiner(&self, account: &AccountId) -> bool {
        self.joiners.contains(account)
    }

    pub fn is_attendee(&self, account: &AccountId) -> bool {
        self.attendees.contains(account)
    }

    /// Whether enough participants checked in for the pool to be split among attendees.
    pub fn threshold_met(&self) -> bool {
        self.attendees.len() as u64 >= u64::from(self.min_check_ins)
    }

    /// Funds currently held on behalf of this commitment: the whole pool until settlement,
    /// nothing afterwards.
    pub fn pool_balance(&self) -> Amount {
        if self.settled {
            Amount::ZERO
        } else {
            self.total_staked
        }
    }

    pub fn status(&self, now: Timestamp) -> CommitmentStatus {
        if self.settled {
            CommitmentStatus::Settled
        } else if self.deadline.has_passed(now) {
            CommitmentStatus::AwaitingSettlement
        } else {
            CommitmentStatus::Open
        }
    }
}

/// Derived lifecycle view of a commitment at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitmentStatus {
    /// Accepting joins and check-ins; settlement not yet legal.
    Open,
    /// Deadline reached, nobody has settled yet. Joins and check-ins still land.
    AwaitingSettlement,
    /// Terminal.
    Settled,
}

impl CommitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::AwaitingSettlement => "awaiting-settlement",
            Self::Settled => "settled",
        }
    }
}

/// What a settlement decided and who it owes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settled_at: Timestamp,
    pub outcome: Outcome,
    pub attendee_count: u32,
    /// Every recipient, the amount assigned to them and its delivery state, in payout
    /// order. Each account appears at most once.
    pub payouts: Vec<Payment>,
    /// Sum of `payouts`; equals `total_staked` at the moment settlement began.
    pub total_distributed: Amount,
}

impl SettlementRecord {
    pub fn payment(&self, account: &AccountId) -> Option<&Payment> {
        self.payouts.iter().find(|p| &p.account == account)
    }

    pub fn payment_mut(&mut self, account: &AccountId) -> Option<&mut Payment> {
        self.payouts.iter_mut().find(|p| &p.account == account)
    }

    /// Payments not yet known to be delivered.
    pub fn undelivered(&self) -> impl Iterator<Item = &Payment> {
        self.payouts
            .iter()
            .filter(|p| p.status != DeliveryStatus::Delivered)
    }
}

/// One settlement transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub account: AccountId,
    pub amount: Amount,
    pub status: DeliveryStatus,
}

impl Payment {
    pub fn pending(account: AccountId, amount: Amount) -> Self {
        Self {
            account,
            amount,
            status: DeliveryStatus::Pending,
        }
    }
}

/// Where a payment stands.
///
/// `Pending` is stored with the settled flag before any funds move, and again while a
/// retry is in flight. A payment left `Pending` after a crash may or may not have been
/// delivered. `Owed` means the transfer definitely failed and the amount is still held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Owed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Owed => "owed",
        }
    }
}

/// The payout rule a settlement applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Threshold met: the pool is divided among attendees. The first attendee in
    /// check-in order also receives the integer-division remainder.
    Split {
        share: Amount,
        remainder: Amount,
        remainder_to: AccountId,
    },
    /// Threshold missed: every joiner gets their stake back.
    Refund { per_joiner: Amount },
}

/// Trait for commitment storage.
///
/// Implementations also own the id counter so that allocating an id and storing the
/// new record happen in one write.
pub trait CommitmentStore {
    /// The id the next created commitment will receive ([`CommitId::FIRST`] on an empty
    /// store).
    fn next_commit_id(&self) -> Result<CommitId, StoreError>;

    /// Store a new commitment and advance the id counter past it, atomically.
    ///
    /// Fails with [`StoreError::Duplicate`] if the id is already taken.
    fn insert_commitment(&self, commitment: &Commitment) -> Result<(), StoreError>;

    /// Read commitment `id`, apply `mutate` to it and write the result back, all inside
    /// one exclusive write.
    ///
    /// No other update of any commitment can interleave between the read and the write,
    /// including from another process sharing the store. If `mutate` returns `Err`,
    /// nothing is written and the error comes back as the inner result. Fails with
    /// [`StoreError::NotFound`] if `id` does not exist.
    fn update_commitment<T, E>(
        &self,
        id: CommitId,
        mutate: impl FnOnce(&mut Commitment) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError>;

    fn get_commitment(&self, id: CommitId) -> Result<Option<Commitment>, StoreError>;

    fn commitment_count(&self) -> Result<u64, StoreError>;

    /// Up to `limit` commitments in id order, skipping the first `offset`.
    fn iter_commitments(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, StoreError>;
}
