use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tierfund_governance::{
    voting_power, Capability, Governance, GovernanceConfig, LedgerTransfer, ManualClock,
    MemoryEventLog, NewProposal, ProposalType, TreasuryCategory, VoteChoice,
};
use tierfund_types::Principal;

const VOTERS: u8 = 100;

fn principal(n: u8) -> Principal {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Principal::from_bytes(bytes)
}

fn admin() -> Principal {
    Principal::from_bytes([0xad; 20])
}

/// Engine with `VOTERS` members and one active Operational proposal.
fn active_engine() -> (Governance, Arc<ManualClock>, u64) {
    let clock = Arc::new(ManualClock::new(1_000));
    let gov = Governance::new(
        GovernanceConfig::with_admin(admin()),
        clock.clone(),
        Arc::new(LedgerTransfer::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .unwrap();
    gov.grant_capability(admin(), admin(), Capability::Executor).unwrap();

    for n in 1..=VOTERS {
        gov.join(principal(n), u128::from(n) * 1_000).unwrap();
    }
    gov.deposit(principal(1), TreasuryCategory::Operational, 1_000_000).unwrap();

    let id = gov
        .create_proposal(NewProposal {
            proposer: principal(1),
            recipient: principal(250),
            amount: 10_000,
            description: "Infrastructure budget".to_string(),
            proposal_type: ProposalType::Operational,
            category: TreasuryCategory::Operational,
        })
        .unwrap();
    gov.activate(id, principal(1)).unwrap();
    (gov, clock, id)
}

fn bench_voting_power(c: &mut Criterion) {
    let mut group = c.benchmark_group("power");
    group.bench_function("small_stake", |b| b.iter(|| black_box(voting_power(black_box(12_345)))));
    group.bench_function("large_stake", |b| {
        b.iter(|| black_box(voting_power(black_box(u128::from(u64::MAX) << 40))))
    });
    group.finish();
}

fn bench_membership(c: &mut Criterion) {
    let mut group = c.benchmark_group("membership");
    group.bench_function("join_existing", |b| {
        b.iter_batched(
            active_engine,
            |(gov, _, _)| black_box(gov.join(principal(7), 1).unwrap()),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("delegate", |b| {
        b.iter_batched(
            active_engine,
            |(gov, _, _)| black_box(gov.delegate(principal(7), principal(8)).unwrap()),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.bench_function("vote_resolve_execute", |b| {
        b.iter_batched(
            active_engine,
            |(gov, clock, id)| {
                for n in 1..=VOTERS {
                    let choice = if n % 3 == 0 { VoteChoice::Against } else { VoteChoice::For };
                    gov.cast_vote(id, principal(n), choice).unwrap();
                }
                let config = gov.proposal_config(ProposalType::Operational);
                clock.advance(config.voting_period + 1);
                gov.resolve(id).unwrap();
                clock.advance(config.timelock_delay);
                gov.execute(id, admin()).unwrap();
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("snapshot", |b| {
        let (gov, _, _) = active_engine();
        b.iter(|| black_box(gov.snapshot()))
    });
    group.finish();
}

criterion_group!(benches, bench_voting_power, bench_membership, bench_lifecycle);
criterion_main!(benches);
