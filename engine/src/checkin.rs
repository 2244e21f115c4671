//! Check-in verification.

use commitclub_crypto::verify_code;
use commitclub_ledger::CommitmentLedger;
use commitclub_store::CommitmentStore;
use commitclub_types::{AccountId, CommitId};

use crate::ClubError;

/// Records attendance for joiners who present the commitment's passphrase.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckInVerifier;

impl CheckInVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Mark `caller` as an attendee of `id`.
    ///
    /// The caller must be a joiner who has not checked in yet, the commitment must be
    /// unsettled, and the hash of `presented_code` must equal the stored code hash.
    /// The deadline does not gate check-ins.
    pub fn check_in<S: CommitmentStore>(
        &self,
        ledger: &mut CommitmentLedger<S>,
        id: CommitId,
        caller: &AccountId,
        presented_code: &str,
    ) -> Result<(), ClubError> {
        ledger.update(id, |c| {
            if c.settled {
                return Err(ClubError::AlreadySettled(id));
            }
            if !c.is_joiner(caller) {
                return Err(ClubError::NotAJoiner {
                    id,
                    account: caller.clone(),
                });
            }
            if c.is_attendee(caller) {
                return Err(ClubError::AlreadyCheckedIn {
                    id,
                    account: caller.clone(),
                });
            }
            if !verify_code(presented_code, &c.code_hash) {
                return Err(ClubError::WrongCode(id));
            }
            c.attendees.push(caller.clone());
            Ok(())
        })
    }
}
