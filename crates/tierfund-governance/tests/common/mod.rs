//! Shared setup for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tierfund_governance::{
    Governance, GovernanceConfig, LedgerTransfer, ManualClock, MemoryEventLog, NewProposal,
    Principal, ProposalType, ValueTransfer,
};

pub const HOUR: u64 = 3_600;
pub const DAY: u64 = 24 * HOUR;
pub const START: u64 = 1_700_000_000;

pub struct TestEnv {
    pub gov: Arc<Governance>,
    pub clock: Arc<ManualClock>,
    pub log: Arc<MemoryEventLog>,
}

pub fn principal(n: u8) -> Principal {
    let mut bytes = [0u8; 20];
    bytes[0] = 0x7f;
    bytes[19] = n;
    Principal::from_bytes(bytes)
}

pub fn admin() -> Principal {
    principal(200)
}

pub fn executor() -> Principal {
    principal(201)
}

pub fn guardian() -> Principal {
    principal(202)
}

/// Engine with default config, an executor and a guardian, paying out
/// through `transfer`.
pub fn setup_with(transfer: Arc<dyn ValueTransfer>) -> TestEnv {
    let clock = Arc::new(ManualClock::new(START));
    let log = Arc::new(MemoryEventLog::new());
    let gov = Governance::new(
        GovernanceConfig::with_admin(admin()),
        clock.clone(),
        transfer,
        log.clone(),
    )
    .unwrap();

    gov.grant_capability(admin(), executor(), tierfund_governance::Capability::Executor)
        .unwrap();
    gov.grant_capability(admin(), guardian(), tierfund_governance::Capability::Guardian)
        .unwrap();

    TestEnv {
        gov: Arc::new(gov),
        clock,
        log,
    }
}

pub fn setup() -> (TestEnv, Arc<LedgerTransfer>) {
    let ledger = Arc::new(LedgerTransfer::new());
    (setup_with(ledger.clone()), ledger)
}

pub fn spend(proposer: Principal, recipient: Principal, amount: u128, ty: ProposalType) -> NewProposal {
    NewProposal {
        proposer,
        recipient,
        amount,
        description: format!("Pay {} to {}", amount, recipient),
        proposal_type: ty,
        category: ty.category(),
    }
}
