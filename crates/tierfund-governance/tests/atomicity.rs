//! All-or-nothing calls, reentrancy rejection and serialised access.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use common::*;
use parking_lot::Mutex;
use tierfund_governance::{
    Amount, Governance, GovernanceError, LedgerTransfer, Principal, ProposalState, ProposalType,
    TransferError, TreasuryCategory, ValueTransfer, VoteChoice,
};

/// Fails every transfer while `failing` is set.
#[derive(Default)]
struct SwitchableTransfer {
    failing: AtomicBool,
    ledger: LedgerTransfer,
}

impl ValueTransfer for SwitchableTransfer {
    fn transfer(&self, to: Principal, amount: Amount) -> Result<(), TransferError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransferError::Unavailable("switched off".to_string()));
        }
        self.ledger.transfer(to, amount)
    }
}

/// Calls back into the engine from inside the transfer.
#[derive(Default)]
struct ReenteringTransfer {
    gov: OnceLock<Weak<Governance>>,
    nested: Mutex<Vec<Result<Amount, GovernanceError>>>,
    stake_seen: Mutex<Vec<Amount>>,
    ledger: LedgerTransfer,
}

impl ValueTransfer for ReenteringTransfer {
    fn transfer(&self, to: Principal, amount: Amount) -> Result<(), TransferError> {
        if let Some(gov) = self.gov.get().and_then(Weak::upgrade) {
            self.stake_seen.lock().push(gov.total_stake());
            self.nested.lock().push(gov.withdraw(to, 1));
            self.nested.lock().push(gov.join(to, 1));
        }
        self.ledger.transfer(to, amount)
    }
}

/// Reads the engine mid-transfer, then reports the transfer outcome.
#[derive(Default)]
struct ObservingTransfer {
    gov: OnceLock<Weak<Governance>>,
    failing: AtomicBool,
    seen: Mutex<Vec<(ProposalState, Amount)>>,
    ledger: LedgerTransfer,
}

impl ValueTransfer for ObservingTransfer {
    fn transfer(&self, to: Principal, amount: Amount) -> Result<(), TransferError> {
        if let Some(gov) = self.gov.get().and_then(Weak::upgrade) {
            if let Ok(proposal) = gov.proposal(1) {
                let balance = gov.treasury_balance(TreasuryCategory::Operational);
                self.seen.lock().push((proposal.state, balance));
            }
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransferError::Rejected {
                to,
                amount,
                reason: "recipient refused".to_string(),
            });
        }
        self.ledger.transfer(to, amount)
    }
}

#[test]
fn test_rejections_leave_state_identical() {
    let (env, _) = setup();
    let gov = &env.gov;
    let a = principal(1);
    gov.join(a, 100).unwrap();
    gov.deposit(a, TreasuryCategory::Experimental, 50).unwrap();
    let id = gov
        .create_proposal(spend(a, principal(9), 10, ProposalType::Experimental))
        .unwrap();

    let before = gov.snapshot();
    let events_before = env.log.len();

    let failures: Vec<Result<(), GovernanceError>> = vec![
        gov.join(Principal::NULL, 5).map(drop),
        gov.withdraw(a, 101).map(drop),
        gov.delegate(a, Principal::NULL).map(drop),
        gov.revoke_delegation(a).map(drop),
        gov.deposit(a, TreasuryCategory::Experimental, 0).map(drop),
        gov.create_proposal(spend(a, Principal::NULL, 10, ProposalType::Experimental)).map(drop),
        gov.cast_vote(id, a, VoteChoice::For).map(drop),
        gov.resolve(id).map(drop),
        gov.execute(id, executor()),
        gov.cancel(id, guardian()),
        gov.activate(id, principal(2)).map(drop),
        gov.activate(999, a).map(drop),
    ];

    assert!(failures.iter().all(|r| r.is_err()), "{:?}", failures);
    assert_eq!(gov.snapshot(), before);
    assert_eq!(env.log.len(), events_before);
}

#[test]
fn test_failed_payout_reverts_execution() {
    let transfer = Arc::new(SwitchableTransfer::default());
    let env = setup_with(transfer.clone());
    let gov = &env.gov;
    let a = principal(1);
    gov.join(a, 100).unwrap();
    gov.deposit(a, TreasuryCategory::Operational, 300).unwrap();

    let id = gov
        .create_proposal(spend(a, principal(9), 120, ProposalType::Operational))
        .unwrap();
    let end = gov.activate(id, a).unwrap();
    gov.cast_vote(id, a, VoteChoice::For).unwrap();
    env.clock.set(end + 1);
    gov.resolve(id).unwrap();
    env.clock.advance(12 * HOUR);

    transfer.failing.store(true, Ordering::SeqCst);
    let before = gov.snapshot();
    let events_before = env.log.len();

    assert!(matches!(
        gov.execute(id, executor()),
        Err(GovernanceError::TransferFailed(_))
    ));
    assert_eq!(gov.snapshot(), before);
    assert_eq!(gov.proposal(id).unwrap().state, ProposalState::Queued);
    assert_eq!(gov.treasury_balance(TreasuryCategory::Operational), 300);
    assert_eq!(env.log.len(), events_before);

    transfer.failing.store(false, Ordering::SeqCst);
    gov.execute(id, executor()).unwrap();
    assert_eq!(transfer.ledger.balance_of(&principal(9)), 120);
    assert_eq!(gov.treasury_balance(TreasuryCategory::Operational), 180);
}

#[test]
fn test_failed_withdraw_restores_stake() {
    let transfer = Arc::new(SwitchableTransfer::default());
    let env = setup_with(transfer.clone());
    let gov = &env.gov;
    let a = principal(1);
    gov.join(a, 400).unwrap();

    transfer.failing.store(true, Ordering::SeqCst);
    assert!(matches!(gov.withdraw(a, 300), Err(GovernanceError::TransferFailed(_))));
    assert_eq!(gov.member(&a).unwrap().stake, 400);
    assert_eq!(gov.total_power(), 200);
}

#[test]
fn test_nested_calls_rejected_during_transfer() {
    let transfer = Arc::new(ReenteringTransfer::default());
    let env = setup_with(transfer.clone());
    let _ = transfer.gov.set(Arc::downgrade(&env.gov));
    let gov = &env.gov;
    let a = principal(1);
    gov.join(a, 100).unwrap();

    assert_eq!(gov.withdraw(a, 40).unwrap(), 60);

    // reads during the transfer see the last committed state
    assert_eq!(*transfer.stake_seen.lock(), vec![100]);
    assert_eq!(
        *transfer.nested.lock(),
        vec![Err(GovernanceError::Reentrancy), Err(GovernanceError::Reentrancy)]
    );
    assert_eq!(gov.member(&a).unwrap().stake, 60);
    assert_eq!(transfer.ledger.balance_of(&a), 40);

    // the guard is released afterwards
    assert_eq!(gov.join(a, 40).unwrap(), 100);
}

#[test]
fn test_concurrent_calls_serialise() {
    let (env, _) = setup();
    let gov = env.gov.clone();

    let handles: Vec<_> = (1..=8u8)
        .map(|n| {
            let gov = gov.clone();
            thread::spawn(move || {
                let p = principal(n);
                for _ in 0..25 {
                    gov.join(p, 4).unwrap();
                    gov.deposit(p, TreasuryCategory::Operational, 3).unwrap();
                }
                gov.withdraw(p, 36).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // each member ends with stake 64 and power 80
    assert_eq!(gov.total_stake(), 8 * 64);
    assert_eq!(gov.total_power(), 8 * 80);
    assert_eq!(gov.treasury_balance(TreasuryCategory::Operational), 8 * 75);
}

#[test]
fn test_readers_never_see_unpaid_execution() {
    let transfer = Arc::new(ObservingTransfer::default());
    let env = setup_with(transfer.clone());
    let _ = transfer.gov.set(Arc::downgrade(&env.gov));
    let gov = &env.gov;
    let a = principal(1);
    gov.join(a, 100).unwrap();
    gov.deposit(a, TreasuryCategory::Operational, 300).unwrap();

    let id = gov
        .create_proposal(spend(a, principal(9), 120, ProposalType::Operational))
        .unwrap();
    assert_eq!(id, 1);
    let end = gov.activate(id, a).unwrap();
    gov.cast_vote(id, a, VoteChoice::For).unwrap();
    env.clock.set(end + 1);
    gov.resolve(id).unwrap();
    env.clock.advance(12 * HOUR);

    transfer.failing.store(true, Ordering::SeqCst);
    assert!(matches!(
        gov.execute(id, executor()),
        Err(GovernanceError::TransferFailed(_))
    ));
    assert_eq!(*transfer.seen.lock(), vec![(ProposalState::Queued, 300)]);
    assert_eq!(gov.proposal(id).unwrap().state, ProposalState::Queued);
    assert_eq!(gov.treasury_balance(TreasuryCategory::Operational), 300);

    // a successful payout commits only after the transfer returns
    transfer.failing.store(false, Ordering::SeqCst);
    gov.execute(id, executor()).unwrap();
    assert_eq!(transfer.seen.lock()[1], (ProposalState::Queued, 300));
    assert_eq!(gov.proposal(id).unwrap().state, ProposalState::Executed);
    assert_eq!(gov.treasury_balance(TreasuryCategory::Operational), 180);
}
