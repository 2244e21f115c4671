//! Property tests for money safety.

use commitclub_crypto::hash_code;
use commitclub_engine::{ClubError, CommitClub};
use commitclub_ledger::CommitmentParams;
use commitclub_nullables::{NullCommitmentStore, NullLiabilityStore, NullPayout};
use commitclub_store::Outcome;
use commitclub_types::{AccountId, Amount, Timestamp};
use proptest::prelude::*;

type Club = CommitClub<NullCommitmentStore, NullLiabilityStore, NullPayout>;

const DEADLINE: u64 = 1_000;

fn account(i: usize) -> AccountId {
    AccountId::new(format!("member-{i}"))
}

/// A commitment with `joiners` members, the listed indices checked in.
fn build(stake: u128, min_check_ins: u32, joiners: usize, attendees: &[usize]) -> (Club, commitclub_types::CommitId) {
    let mut club = CommitClub::new(NullCommitmentStore::new(), NullLiabilityStore::new(), NullPayout::new());
    let now = Timestamp::new(0);
    let id = club
        .create_commit(
            &AccountId::new("organizer"),
            CommitmentParams {
                name: "prop".into(),
                stake_amount: Amount::new(stake),
                min_check_ins,
                deadline: Timestamp::new(DEADLINE),
                code_hash: hash_code("pw"),
            },
            now,
        )
        .unwrap();
    for i in 0..joiners {
        club.join_commit(id, &account(i), Amount::new(stake), now).unwrap();
    }
    for &i in attendees {
        club.check_in(id, &account(i), "pw", now).unwrap();
    }
    (club, id)
}

fn attendance() -> impl Strategy<Value = (usize, Vec<usize>)> {
    (0usize..12).prop_flat_map(|n| {
        let picks = if n == 0 {
            Just(Vec::new()).boxed()
        } else {
            proptest::sample::subsequence((0..n).collect::<Vec<_>>(), 0..=n)
                .prop_shuffle()
                .boxed()
        };
        (Just(n), picks)
    })
}

proptest! {
    #[test]
    fn settlement_conserves_the_pool(
        stake in 1u128..1_000_000_000_000_000_000_000,
        min in 1u32..8,
        (joiners, attendees) in attendance(),
    ) {
        let (mut club, id) = build(stake, min, joiners, &attendees);
        let staked = club.get_commitment(id).unwrap().total_staked;
        prop_assert_eq!(staked, Amount::new(stake * joiners as u128));

        let report = club.settle_commit(id, Timestamp::new(DEADLINE)).unwrap();
        prop_assert_eq!(report.record.total_distributed, staked);
        prop_assert_eq!(club.payout().total_delivered(), Some(staked));
    }

    #[test]
    fn threshold_decides_split_or_refund(
        stake in 1u128..1_000_000,
        min in 1u32..8,
        (joiners, attendees) in attendance(),
    ) {
        let (mut club, id) = build(stake, min, joiners, &attendees);
        club.settle_commit(id, Timestamp::new(DEADLINE)).unwrap();
        let c = club.get_commitment(id).unwrap();
        let record = c.settlement.unwrap();
        let totals = club.payout().totals().unwrap();

        if attendees.len() >= min as usize {
            prop_assert!(matches!(record.outcome, Outcome::Split { .. }), "expected split outcome");
            for (who, _) in &totals {
                prop_assert!(c.attendees.contains(who));
            }
            let share = (stake * joiners as u128) / attendees.len() as u128;
            for a in &c.attendees[1..] {
                prop_assert_eq!(totals[a], Amount::new(share));
            }
        } else {
            prop_assert_eq!(record.outcome, Outcome::Refund { per_joiner: Amount::new(stake) });
            prop_assert_eq!(totals.len(), joiners);
            prop_assert!(totals.values().all(|a| *a == Amount::new(stake)));
        }
    }

    #[test]
    fn wrong_deposit_never_accepted(
        stake in 1u128..1_000_000,
        deposit in 0u128..2_000_000,
    ) {
        prop_assume!(deposit != stake);
        let (mut club, id) = build(stake, 1, 1, &[]);
        let before = club.get_commitment(id).unwrap();

        let err = club.join_commit(id, &AccountId::new("newcomer"), Amount::new(deposit), Timestamp::new(1));
        prop_assert!(matches!(err, Err(ClubError::WrongStakeAmount { .. })), "expected wrong stake error");
        prop_assert_eq!(club.get_commitment(id).unwrap(), before);
    }

    #[test]
    fn non_joiner_never_checks_in(code in "[a-z]{1,8}") {
        let (mut club, id) = build(10, 1, 2, &[]);
        let err = club.check_in(id, &AccountId::new("outsider"), &code, Timestamp::new(1));
        prop_assert!(matches!(err, Err(ClubError::NotAJoiner { .. })), "expected not-a-joiner error");
    }

    #[test]
    fn second_settle_always_rejected(
        (joiners, attendees) in attendance(),
        later in 0u64..10_000,
    ) {
        let (mut club, id) = build(7, 1, joiners, &attendees);
        club.settle_commit(id, Timestamp::new(DEADLINE)).unwrap();
        let settled = club.get_commitment(id).unwrap();
        let delivered = club.payout().delivered().len();

        let err = club.settle_commit(id, Timestamp::new(DEADLINE + later));
        prop_assert!(matches!(err, Err(ClubError::AlreadySettled(_))), "expected already settled");
        prop_assert_eq!(club.get_commitment(id).unwrap(), settled);
        prop_assert_eq!(club.payout().delivered().len(), delivered);
    }
}
