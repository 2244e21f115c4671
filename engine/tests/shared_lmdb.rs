//! Two engines writing to one LMDB environment at the same time.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use commitclub_crypto::hash_code;
use commitclub_engine::{ClubError, CommitClub};
use commitclub_ledger::CommitmentParams;
use commitclub_store::{BalanceBook, BalanceStore, Commitment, CommitmentStore, StoreError};
use commitclub_store_lmdb::{
    check_integrity, LmdbBalanceStore, LmdbCommitmentStore, LmdbEnvironment, LmdbLiabilityStore,
};
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};

const MAP_SIZE: usize = 16 * 1024 * 1024;
const STAKE: u128 = 250;

type SharedClub = CommitClub<Lockstep<LmdbCommitmentStore>, LmdbLiabilityStore, BalanceBook<LmdbBalanceStore>>;

/// Holds its first commitment update at a barrier so that two engines enter it together.
struct Lockstep<S> {
    inner: S,
    barrier: Mutex<Option<Arc<Barrier>>>,
}

impl<S> Lockstep<S> {
    fn new(inner: S, barrier: Arc<Barrier>) -> Self {
        Self {
            inner,
            barrier: Mutex::new(Some(barrier)),
        }
    }
}

impl<S: CommitmentStore> CommitmentStore for Lockstep<S> {
    fn next_commit_id(&self) -> Result<CommitId, StoreError> {
        self.inner.next_commit_id()
    }

    fn insert_commitment(&self, commitment: &Commitment) -> Result<(), StoreError> {
        self.inner.insert_commitment(commitment)
    }

    fn update_commitment<T, E>(
        &self,
        id: CommitId,
        mutate: impl FnOnce(&mut Commitment) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        let barrier = self.barrier.lock().unwrap().take();
        if let Some(barrier) = barrier {
            barrier.wait();
        }
        self.inner.update_commitment(id, mutate)
    }

    fn get_commitment(&self, id: CommitId) -> Result<Option<Commitment>, StoreError> {
        self.inner.get_commitment(id)
    }

    fn commitment_count(&self) -> Result<u64, StoreError> {
        self.inner.commitment_count()
    }

    fn iter_commitments(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, StoreError> {
        self.inner.iter_commitments(offset, limit)
    }
}

fn params(name: &str) -> CommitmentParams {
    CommitmentParams {
        name: name.into(),
        stake_amount: Amount::new(STAKE),
        min_check_ins: 1,
        deadline: Timestamp::new(100),
        code_hash: hash_code("shared"),
    }
}

fn create(env: &LmdbEnvironment, name: &str, joiners: &[&AccountId]) -> CommitId {
    let mut club = CommitClub::new(
        env.commitment_store(),
        env.liability_store(),
        BalanceBook::new(env.balance_store()),
    );
    let id = club
        .create_commit(&AccountId::new("org"), params(name), Timestamp::new(0))
        .unwrap();
    for j in joiners {
        club.join_commit(id, j, Amount::new(STAKE), Timestamp::new(1)).unwrap();
        club.check_in(id, j, "shared", Timestamp::new(2)).unwrap();
    }
    id
}

fn lockstep_club(env: &LmdbEnvironment, barrier: &Arc<Barrier>) -> SharedClub {
    CommitClub::new(
        Lockstep::new(env.commitment_store(), Arc::clone(barrier)),
        env.liability_store(),
        BalanceBook::new(env.balance_store()),
    )
}

#[test]
fn concurrent_settles_pay_the_pool_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();

    for round in 0..4 {
        let winner = AccountId::new(format!("attendee-{round}"));
        let id = create(&env, &format!("Round {round}"), &[&winner]);
        let barrier = Arc::new(Barrier::new(2));

        let results: Vec<Result<Amount, ClubError>> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let env = &env;
                    let barrier = &barrier;
                    s.spawn(move || {
                        let mut club = lockstep_club(env, barrier);
                        club.settle_commit(id, Timestamp::new(100))
                            .map(|report| report.record.total_distributed)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let settled = results.iter().filter(|r| r.is_ok()).count();
        let refused = results
            .iter()
            .filter(|r| matches!(r, Err(ClubError::AlreadySettled(_))))
            .count();
        assert_eq!((settled, refused), (1, 1), "round {round}: {results:?}");
        assert_eq!(env.balance_store().balance(&winner).unwrap(), Amount::new(STAKE));
    }

    let report = check_integrity(&env).unwrap();
    assert!(report.is_healthy(), "integrity errors: {:?}", report.errors);
}

#[test]
fn concurrent_joins_keep_both_deposits() {
    let dir = tempfile::tempdir().expect("temp dir");
    let env = LmdbEnvironment::open(dir.path(), MAP_SIZE).unwrap();
    let id = create(&env, "Climb", &[]);
    let barrier = Arc::new(Barrier::new(2));
    let alice = AccountId::new("alice");
    let bob = AccountId::new("bob");

    thread::scope(|s| {
        for who in [&alice, &bob] {
            let env = &env;
            let barrier = &barrier;
            s.spawn(move || {
                let mut club = lockstep_club(env, barrier);
                club.join_commit(id, who, Amount::new(STAKE), Timestamp::new(5)).unwrap();
            });
        }
    });

    let stored = env.commitment_store().get_commitment(id).unwrap().unwrap();
    assert_eq!(stored.joiners.len(), 2);
    assert!(stored.is_joiner(&alice));
    assert!(stored.is_joiner(&bob));
    assert_eq!(stored.total_staked, Amount::new(2 * STAKE));
}
