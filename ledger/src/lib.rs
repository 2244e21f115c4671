//! Commitment ledger.
//!
//! Allocates commitment ids and holds canonical commitment state in an injected
//! [`CommitmentStore`](commitclub_store::CommitmentStore). Nothing else constructs a
//! commitment record; every later mutation goes through [`CommitmentLedger::update`].

pub mod error;
pub mod ledger;

pub use error::LedgerError;
pub use ledger::{CommitmentLedger, CommitmentParams};
