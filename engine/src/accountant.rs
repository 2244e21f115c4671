//! Stake accountant: admits joiners and accounts for their deposits.

use commitclub_ledger::CommitmentLedger;
use commitclub_store::CommitmentStore;
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};

use crate::{ClubError, JoinPolicy};

/// Accepts exactly-one, exact-amount deposits per account per commitment.
#[derive(Clone, Copy, Debug, Default)]
pub struct StakeAccountant {
    policy: JoinPolicy,
}

impl StakeAccountant {
    pub fn new(policy: JoinPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> JoinPolicy {
        self.policy
    }

    /// Add `caller` as a joiner of `id`, accepting `deposit` into the pool.
    ///
    /// Checks run in order: the commitment exists, is not settled, is still accepting
    /// joins under the configured policy, `caller` has not joined, and `deposit` equals
    /// the stake exactly. On any failure the deposit is not accepted and nothing changes.
    pub fn join<S: CommitmentStore>(
        &self,
        ledger: &mut CommitmentLedger<S>,
        id: CommitId,
        caller: &AccountId,
        deposit: Amount,
        now: Timestamp,
    ) -> Result<(), ClubError> {
        let policy = self.policy;
        ledger.update(id, |c| {
            if c.settled {
                return Err(ClubError::AlreadySettled(id));
            }
            if policy == JoinPolicy::UntilDeadline && c.deadline.has_passed(now) {
                return Err(ClubError::JoinClosed {
                    id,
                    deadline: c.deadline,
                });
            }
            if c.is_joiner(caller) {
                return Err(ClubError::AlreadyJoined {
                    id,
                    account: caller.clone(),
                });
            }
            if deposit != c.stake_amount {
                return Err(ClubError::WrongStakeAmount {
                    expected: c.stake_amount,
                    got: deposit,
                });
            }

            c.total_staked = c
                .total_staked
                .checked_add(deposit)
                .ok_or_else(|| ClubError::Overflow(format!("total staked of commitment {id}")))?;
            c.joiners.push(caller.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitclub_crypto::hash_code;
    use commitclub_ledger::CommitmentParams;
    use commitclub_nullables::NullCommitmentStore;

    const STAKE: u128 = 1_000;

    fn setup(policy: JoinPolicy) -> (StakeAccountant, CommitmentLedger<NullCommitmentStore>, CommitId) {
        let mut ledger = CommitmentLedger::new(NullCommitmentStore::new());
        let id = ledger
            .create(
                &AccountId::new("organizer"),
                CommitmentParams {
                    name: "Gym".into(),
                    stake_amount: Amount::new(STAKE),
                    min_check_ins: 1,
                    deadline: Timestamp::new(100),
                    code_hash: hash_code("lift"),
                },
                Timestamp::new(0),
            )
            .unwrap();
        (StakeAccountant::new(policy), ledger, id)
    }

    #[test]
    fn join_records_joiner_and_stake() {
        let (acct, mut ledger, id) = setup(JoinPolicy::UntilSettled);
        let alice = AccountId::new("alice");
        acct.join(&mut ledger, id, &alice, Amount::new(STAKE), Timestamp::new(1))
            .unwrap();

        let c = ledger.get(id).unwrap();
        assert_eq!(c.joiners, vec![alice]);
        assert_eq!(c.total_staked, Amount::new(STAKE));
    }

    #[test]
    fn second_join_by_same_account_rejected() {
        let (acct, mut ledger, id) = setup(JoinPolicy::UntilSettled);
        let alice = AccountId::new("alice");
        acct.join(&mut ledger, id, &alice, Amount::new(STAKE), Timestamp::new(1))
            .unwrap();
        let err = acct
            .join(&mut ledger, id, &alice, Amount::new(STAKE), Timestamp::new(2))
            .unwrap_err();
        assert!(matches!(err, ClubError::AlreadyJoined { .. }));
        assert_eq!(ledger.get(id).unwrap().total_staked, Amount::new(STAKE));
    }

    #[test]
    fn deposit_must_match_exactly() {
        let (acct, mut ledger, id) = setup(JoinPolicy::UntilSettled);
        let bob = AccountId::new("bob");
        for wrong in [0, STAKE - 1, STAKE + 1] {
            let err = acct
                .join(&mut ledger, id, &bob, Amount::new(wrong), Timestamp::new(1))
                .unwrap_err();
            assert!(matches!(
                err,
                ClubError::WrongStakeAmount { expected, got }
                    if expected == Amount::new(STAKE) && got == Amount::new(wrong)
            ));
        }
        let c = ledger.get(id).unwrap();
        assert!(c.joiners.is_empty());
        assert_eq!(c.total_staked, Amount::ZERO);
    }

    #[test]
    fn unknown_commitment_not_found() {
        let (acct, mut ledger, _) = setup(JoinPolicy::UntilSettled);
        let err = acct
            .join(
                &mut ledger,
                CommitId::new(9),
                &AccountId::new("alice"),
                Amount::new(STAKE),
                Timestamp::new(1),
            )
            .unwrap_err();
        assert!(matches!(err, ClubError::NotFound(id) if id == CommitId::new(9)));
    }

    #[test]
    fn settled_commitment_rejects_joins() {
        let (acct, mut ledger, id) = setup(JoinPolicy::UntilSettled);
        ledger
            .update(id, |c| {
                c.settled = true;
                Ok::<_, ClubError>(())
            })
            .unwrap();
        let err = acct
            .join(&mut ledger, id, &AccountId::new("alice"), Amount::new(STAKE), Timestamp::new(200))
            .unwrap_err();
        assert!(matches!(err, ClubError::AlreadySettled(_)));
    }

    #[test]
    fn late_join_depends_on_policy() {
        let (open, mut ledger, id) = setup(JoinPolicy::UntilSettled);
        open.join(&mut ledger, id, &AccountId::new("late"), Amount::new(STAKE), Timestamp::new(100))
            .unwrap();

        let (closed, mut ledger, id) = setup(JoinPolicy::UntilDeadline);
        closed
            .join(&mut ledger, id, &AccountId::new("early"), Amount::new(STAKE), Timestamp::new(99))
            .unwrap();
        let err = closed
            .join(&mut ledger, id, &AccountId::new("late"), Amount::new(STAKE), Timestamp::new(100))
            .unwrap_err();
        assert!(matches!(err, ClubError::JoinClosed { deadline, .. } if deadline == Timestamp::new(100)));
        assert_eq!(ledger.get(id).unwrap().joiners.len(), 1);
    }
}
