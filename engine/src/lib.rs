//! CommitClub engine: stake, check in, settle.
//!
//! A commitment is a pool of equal stakes held against an attendance goal. This crate
//! holds the three components that mutate a commitment after the
//! [`CommitmentLedger`](commitclub_ledger::CommitmentLedger) creates it:
//!
//! - [`StakeAccountant`]: exact-amount, one-time deposits
//! - [`CheckInVerifier`]: passphrase-gated, one-time attendance
//! - [`SettlementEngine`]: deadline-gated, exactly-once payout. Undeliverable payouts
//!   are kept as retryable liabilities.
//!
//! [`CommitClub`] wires them to a ledger, a liability store and a payout sink, and
//! publishes a [`ClubEvent`] for every state change.

pub mod accountant;
pub mod checkin;
pub mod club;
pub mod config;
pub mod error;
pub mod event;
pub mod liability;
pub mod settlement;

pub use accountant::StakeAccountant;
pub use checkin::CheckInVerifier;
pub use club::CommitClub;
pub use config::{ClubConfig, JoinPolicy};
pub use error::ClubError;
pub use event::{ClubEvent, EventBus};
pub use liability::RetryOutcome;
pub use settlement::{plan_settlement, SettlementEngine, SettlementReport};
