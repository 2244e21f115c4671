//! Settlement: the one-time, deadline-gated payout of a commitment's pool.
//!
//! Settlement runs in three steps. The first computes the payout set from ledger state and
//! stores it, every payment `Pending`, together with `settled = true` in a single ledger
//! write. Only then are funds moved. A transfer that fails does not reopen the commitment;
//! the amount owed is stored as a [`Liability`] and can be retried. The last step writes
//! each payment's final [`DeliveryStatus`] back to the settlement record, which stays the
//! authoritative account of who was paid and who is owed.

use commitclub_ledger::CommitmentLedger;
use commitclub_store::{
    Commitment, CommitmentStore, DeliveryStatus, Liability, LiabilityStore, Outcome, Payment,
    Payout, SettlementRecord,
};
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};
use tracing::{error, warn};

use crate::ClubError;

/// Compute the payout set for `commitment` as if it settled at `now`.
///
/// With the attendance threshold met, the pool is split evenly among attendees and the
/// integer-division remainder goes to the first attendee in check-in order. Otherwise
/// every joiner is refunded their stake. Payouts always sum to `total_staked` and start
/// out `Pending`.
///
/// This reads nothing but the commitment itself and does not check the deadline or the
/// settled flag.
pub fn plan_settlement(commitment: &Commitment, now: Timestamp) -> Result<SettlementRecord, ClubError> {
    let id = commitment.id;
    let attendee_count = u32::try_from(commitment.attendees.len())
        .map_err(|_| ClubError::Overflow(format!("attendee count of commitment {id}")))?;

    let (outcome, payouts) = if commitment.threshold_met() {
        let Some(first) = commitment.attendees.first() else {
            return Err(ClubError::Corrupted {
                id,
                reason: "threshold met without attendees".into(),
            });
        };
        let (share, remainder) = commitment
            .total_staked
            .split(u64::from(attendee_count))
            .ok_or_else(|| ClubError::Overflow(format!("pool split of commitment {id}")))?;
        let first_payout = share
            .checked_add(remainder)
            .ok_or_else(|| ClubError::Overflow(format!("remainder payout of commitment {id}")))?;

        let payouts = commitment
            .attendees
            .iter()
            .enumerate()
            .map(|(i, a)| Payment::pending(a.clone(), if i == 0 { first_payout } else { share }))
            .collect::<Vec<_>>();
        let outcome = Outcome::Split {
            share,
            remainder,
            remainder_to: first.clone(),
        };
        (outcome, payouts)
    } else {
        let payouts = commitment
            .joiners
            .iter()
            .map(|j| Payment::pending(j.clone(), commitment.stake_amount))
            .collect::<Vec<_>>();
        let outcome = Outcome::Refund {
            per_joiner: commitment.stake_amount,
        };
        (outcome, payouts)
    };

    let total_distributed = Amount::checked_sum(payouts.iter().map(|p| p.amount))
        .ok_or_else(|| ClubError::Overflow(format!("payout total of commitment {id}")))?;
    if total_distributed != commitment.total_staked {
        return Err(ClubError::Corrupted {
            id,
            reason: format!(
                "payouts total {total_distributed} but {} is staked",
                commitment.total_staked
            ),
        });
    }

    Ok(SettlementRecord {
        settled_at: now,
        outcome,
        attendee_count,
        payouts,
        total_distributed,
    })
}

/// Set the delivery status of payments on the settlement record of `id` in one ledger
/// write, returning the updated record.
pub(crate) fn record_delivery<S: CommitmentStore>(
    ledger: &mut CommitmentLedger<S>,
    id: CommitId,
    statuses: &[(AccountId, DeliveryStatus)],
) -> Result<SettlementRecord, ClubError> {
    ledger.update(id, |c| {
        let record = c.settlement.as_mut().ok_or_else(|| ClubError::Corrupted {
            id,
            reason: "no settlement record".into(),
        })?;
        for (account, status) in statuses {
            let payment = record.payment_mut(account).ok_or_else(|| ClubError::Corrupted {
                id,
                reason: format!("no payout to {account}"),
            })?;
            payment.status = *status;
        }
        Ok(record.clone())
    })
}

/// Result of one `settle` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementReport {
    pub commit_id: CommitId,
    /// The settlement record as last stored.
    pub record: SettlementRecord,
    /// Transfers that went through, in payout order.
    pub delivered: Vec<(AccountId, Amount)>,
    /// Transfers that failed and are now owed.
    pub liabilities: Vec<Liability>,
    /// Owed recipients whose liability could not be stored. The debt is still marked
    /// `Owed` on the settlement record and is restored before the next retry.
    pub unrecorded: Vec<AccountId>,
}

impl SettlementReport {
    /// Whether any recipient is still owed funds.
    pub fn is_partial(&self) -> bool {
        !self.liabilities.is_empty()
    }

    /// `None` on overflow.
    pub fn total_delivered(&self) -> Option<Amount> {
        Amount::checked_sum(self.delivered.iter().map(|(_, a)| *a))
    }

    /// `None` on overflow.
    pub fn total_owed(&self) -> Option<Amount> {
        Amount::checked_sum(self.liabilities.iter().map(|l| l.amount))
    }
}

/// Executes settlements. Settlement has no caller check: anyone may trigger it once the
/// deadline has passed.
#[derive(Clone, Copy, Debug, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    pub fn new() -> Self {
        Self
    }

    /// Settle commitment `id` at `now`.
    ///
    /// Fails with `NotFound`, `TooEarly` or `AlreadySettled` without touching state.
    /// Once the settlement record is stored, the call succeeds: individual transfer
    /// failures are recorded in `liabilities` and returned in the report.
    pub fn settle<S, L, P>(
        &self,
        ledger: &mut CommitmentLedger<S>,
        liabilities: &L,
        payout: &mut P,
        id: CommitId,
        now: Timestamp,
    ) -> Result<SettlementReport, ClubError>
    where
        S: CommitmentStore,
        L: LiabilityStore,
        P: Payout,
    {
        let planned = ledger.update(id, |c| {
            if !c.deadline.has_passed(now) {
                return Err(ClubError::TooEarly {
                    id,
                    deadline: c.deadline,
                    now,
                });
            }
            if c.settled {
                return Err(ClubError::AlreadySettled(id));
            }
            let record = plan_settlement(c, now)?;
            c.settled = true;
            c.settlement = Some(record.clone());
            Ok(record)
        })?;

        let mut delivered = Vec::with_capacity(planned.payouts.len());
        let mut owed = Vec::new();
        let mut unrecorded = Vec::new();
        let mut statuses = Vec::with_capacity(planned.payouts.len());
        for Payment { account, amount, .. } in &planned.payouts {
            match payout.transfer(account, *amount) {
                Ok(()) => {
                    delivered.push((account.clone(), *amount));
                    statuses.push((account.clone(), DeliveryStatus::Delivered));
                }
                Err(e) => {
                    warn!(commit = %id, %account, %amount, error = %e, "settlement transfer failed");
                    let liability = Liability {
                        commit_id: id,
                        account: account.clone(),
                        amount: *amount,
                        reason: e.to_string(),
                        recorded_at: now,
                        attempts: 1,
                        last_attempt_at: now,
                    };
                    if let Err(store_err) = liabilities.put_liability(&liability) {
                        error!(
                            commit = %id,
                            %account,
                            %amount,
                            error = %store_err,
                            "failed to record liability for undelivered payout"
                        );
                        unrecorded.push(account.clone());
                    }
                    statuses.push((account.clone(), DeliveryStatus::Owed));
                    owed.push(liability);
                }
            }
        }

        let record = match record_delivery(ledger, id, &statuses) {
            Ok(record) => record,
            Err(e) => {
                error!(commit = %id, error = %e, "failed to record payout delivery; payouts stay pending");
                planned
            }
        };

        Ok(SettlementReport {
            commit_id: id,
            record,
            delivered,
            liabilities: owed,
            unrecorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CheckInVerifier, StakeAccountant};
    use commitclub_crypto::hash_code;
    use commitclub_ledger::CommitmentParams;
    use commitclub_nullables::{NullCommitmentStore, NullLiabilityStore, NullPayout};

    const DEADLINE: u64 = 100;

    struct Fixture {
        ledger: CommitmentLedger<NullCommitmentStore>,
        liabilities: NullLiabilityStore,
        payout: NullPayout,
        id: CommitId,
    }

    fn fixture(stake: u128, min_check_ins: u32, joiners: &[&str], attendees: &[&str]) -> Fixture {
        let mut ledger = CommitmentLedger::new(NullCommitmentStore::new());
        let id = ledger
            .create(
                &AccountId::new("organizer"),
                CommitmentParams {
                    name: "Standup".into(),
                    stake_amount: Amount::new(stake),
                    min_check_ins,
                    deadline: Timestamp::new(DEADLINE),
                    code_hash: hash_code("code"),
                },
                Timestamp::new(0),
            )
            .unwrap();
        for j in joiners {
            StakeAccountant::default()
                .join(&mut ledger, id, &AccountId::new(*j), Amount::new(stake), Timestamp::new(1))
                .unwrap();
        }
        for a in attendees {
            CheckInVerifier::new()
                .check_in(&mut ledger, id, &AccountId::new(*a), "code")
                .unwrap();
        }
        Fixture {
            ledger,
            liabilities: NullLiabilityStore::new(),
            payout: NullPayout::new(),
            id,
        }
    }

    impl Fixture {
        fn settle(&mut self, now: u64) -> Result<SettlementReport, ClubError> {
            SettlementEngine::new().settle(
                &mut self.ledger,
                &self.liabilities,
                &mut self.payout,
                self.id,
                Timestamp::new(now),
            )
        }
    }

    #[test]
    fn plan_split_assigns_remainder_to_first_attendee() {
        let f = fixture(10, 1, &["a", "b", "c", "d"], &["c", "a", "b"]);
        let c = f.ledger.get(f.id).unwrap();
        let record = plan_settlement(&c, Timestamp::new(DEADLINE)).unwrap();

        assert_eq!(
            record.outcome,
            Outcome::Split {
                share: Amount::new(13),
                remainder: Amount::new(1),
                remainder_to: AccountId::new("c"),
            }
        );
        assert_eq!(
            record.payouts,
            vec![
                Payment::pending(AccountId::new("c"), Amount::new(14)),
                Payment::pending(AccountId::new("a"), Amount::new(13)),
                Payment::pending(AccountId::new("b"), Amount::new(13)),
            ]
        );
        assert_eq!(record.total_distributed, Amount::new(40));
        assert_eq!(record.attendee_count, 3);
    }

    #[test]
    fn plan_refund_pays_every_joiner_their_stake() {
        let f = fixture(10, 3, &["a", "b", "c"], &["a"]);
        let c = f.ledger.get(f.id).unwrap();
        let record = plan_settlement(&c, Timestamp::new(DEADLINE)).unwrap();

        assert_eq!(record.outcome, Outcome::Refund { per_joiner: Amount::new(10) });
        assert_eq!(record.payouts.len(), 3);
        assert!(record.payouts.iter().all(|p| p.amount == Amount::new(10)));
        assert_eq!(record.attendee_count, 1);
    }

    #[test]
    fn plan_rejects_inconsistent_totals() {
        let f = fixture(10, 1, &["a"], &["a"]);
        let mut c = f.ledger.get(f.id).unwrap();
        c.total_staked = Amount::new(11);
        c.min_check_ins = 2;
        assert!(matches!(
            plan_settlement(&c, Timestamp::new(DEADLINE)),
            Err(ClubError::Corrupted { .. })
        ));
    }

    #[test]
    fn settle_before_deadline_is_too_early() {
        let mut f = fixture(10, 1, &["a"], &["a"]);
        let err = f.settle(DEADLINE - 1).unwrap_err();
        assert!(matches!(err, ClubError::TooEarly { .. }));
        assert!(!f.ledger.get(f.id).unwrap().settled);
        assert_eq!(f.payout.attempts(), 0);
    }

    #[test]
    fn settle_exactly_at_deadline_is_allowed() {
        let mut f = fixture(10, 1, &["a"], &["a"]);
        let report = f.settle(DEADLINE).unwrap();
        assert!(!report.is_partial());
        assert_eq!(f.payout.received_by(&AccountId::new("a")), Some(Amount::new(10)));
    }

    #[test]
    fn settle_twice_pays_once() {
        let mut f = fixture(10, 1, &["a", "b"], &["a"]);
        f.settle(DEADLINE + 1).unwrap();
        let err = f.settle(DEADLINE + 2).unwrap_err();
        assert!(matches!(err, ClubError::AlreadySettled(_)));
        assert_eq!(f.payout.attempts(), 1);
        assert_eq!(f.payout.total_delivered(), Some(Amount::new(20)));
    }

    #[test]
    fn settled_record_tracks_final_delivery_status() {
        let mut f = fixture(10, 1, &["a"], &["a"]);
        let report = f.settle(DEADLINE).unwrap();
        let c = f.ledger.get(f.id).unwrap();
        assert!(c.settled);
        assert_eq!(c.settlement.as_ref(), Some(&report.record));
        assert_eq!(c.pool_balance(), Amount::ZERO);
        let record = c.settlement.unwrap();
        assert_eq!(
            record.payment(&AccountId::new("a")).map(|p| p.status),
            Some(DeliveryStatus::Delivered)
        );
        assert_eq!(record.undelivered().count(), 0);
    }

    #[test]
    fn store_failure_during_marking_moves_no_funds() {
        let mut f = fixture(10, 1, &["a"], &["a"]);
        f.ledger.store().fail_writes(true);
        let err = f.settle(DEADLINE).unwrap_err();
        assert!(matches!(err, ClubError::Storage(_)));
        assert_eq!(f.payout.attempts(), 0);
        f.ledger.store().fail_writes(false);
        assert!(!f.ledger.get(f.id).unwrap().settled);
    }

    #[test]
    fn failed_transfer_becomes_liability_without_reopening() {
        let mut f = fixture(10, 1, &["a", "b"], &["a", "b"]);
        f.payout.reject(&AccountId::new("b"));

        let report = f.settle(DEADLINE).unwrap();
        assert!(report.is_partial());
        assert_eq!(report.delivered, vec![(AccountId::new("a"), Amount::new(10))]);
        assert_eq!(report.total_owed(), Some(Amount::new(10)));
        assert!(report.unrecorded.is_empty());

        let stored = f
            .liabilities
            .get_liability(f.id, &AccountId::new("b"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.amount, Amount::new(10));
        assert_eq!(stored.attempts, 1);

        let c = f.ledger.get(f.id).unwrap();
        assert!(c.settled);
        let record = c.settlement.unwrap();
        assert_eq!(
            record.payment(&AccountId::new("b")).map(|p| p.status),
            Some(DeliveryStatus::Owed)
        );
    }

    #[test]
    fn unstorable_liability_stays_owed_on_the_record() {
        let mut f = fixture(10, 1, &["a", "b"], &["a", "b"]);
        let bob = AccountId::new("b");
        f.payout.reject(&bob);
        f.liabilities.fail_writes(true);

        let report = f.settle(DEADLINE).unwrap();
        assert_eq!(report.unrecorded, vec![bob.clone()]);
        assert_eq!(report.total_owed(), Some(Amount::new(10)));

        f.liabilities.fail_writes(false);
        assert!(f.liabilities.iter_liabilities().unwrap().is_empty());
        let record = f.ledger.get(f.id).unwrap().settlement.unwrap();
        let owed = record.payment(&bob).unwrap();
        assert_eq!(owed.status, DeliveryStatus::Owed);
        assert_eq!(owed.amount, Amount::new(10));
        assert_eq!(report.record, record);
    }

    #[test]
    fn empty_commitment_settles_with_no_transfers() {
        let mut f = fixture(10, 1, &[], &[]);
        let report = f.settle(DEADLINE).unwrap();
        assert!(report.delivered.is_empty());
        assert_eq!(report.record.total_distributed, Amount::ZERO);
        assert!(f.ledger.get(f.id).unwrap().settled);
    }
}
