use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use commitclub_crypto::hash_code;
use commitclub_engine::{plan_settlement, CommitClub};
use commitclub_ledger::CommitmentParams;
use commitclub_nullables::{NullCommitmentStore, NullLiabilityStore, NullPayout};
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};

type Club = CommitClub<NullCommitmentStore, NullLiabilityStore, NullPayout>;

fn populated(members: usize) -> (Club, CommitId) {
    let mut club = CommitClub::new(NullCommitmentStore::new(), NullLiabilityStore::new(), NullPayout::new());
    let id = club
        .create_commit(
            &AccountId::new("organizer"),
            CommitmentParams {
                name: "bench".into(),
                stake_amount: Amount::new(1_000_000_000_000_000_000),
                min_check_ins: 1,
                deadline: Timestamp::new(100),
                code_hash: hash_code("bench"),
            },
            Timestamp::new(0),
        )
        .unwrap();
    for i in 0..members {
        let who = AccountId::new(format!("member-{i}"));
        club.join_commit(id, &who, Amount::new(1_000_000_000_000_000_000), Timestamp::new(1))
            .unwrap();
        if i % 3 == 0 {
            club.check_in(id, &who, "bench", Timestamp::new(2)).unwrap();
        }
    }
    (club, id)
}

fn plan_bench(c: &mut Criterion) {
    let (club, id) = populated(500);
    let commitment = club.get_commitment(id).unwrap();

    c.bench_function("plan_settlement_500_members", |b| {
        b.iter(|| plan_settlement(black_box(&commitment), Timestamp::new(100)))
    });
}

fn settle_bench(c: &mut Criterion) {
    c.bench_function("settle_100_members", |b| {
        b.iter_batched(
            || populated(100),
            |(mut club, id)| club.settle_commit(id, Timestamp::new(100)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, plan_bench, settle_bench);
criterion_main!(benches);
