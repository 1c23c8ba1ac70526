//! Governance engine.
//!
//! Owns all registries and exposes every mutating entry point. Calls are
//! serialised: a second thread waits for the call in progress, while a
//! nested call made from inside a value transfer on the same thread is
//! rejected with `Reentrancy`. Each call either commits completely or
//! leaves the state untouched.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal, ProposalId, Timestamp};
use tracing::{debug, info, warn};

use crate::access::{AccessGate, Capability};
use crate::config::{ConfigError, GovernanceConfig, TypeConfigs};
use crate::delegation::DelegationGraph;
use crate::env::{Clock, ValueTransfer};
use crate::error::GovernanceError;
use crate::events::{EventSink, GovernanceEvent};
use crate::membership::{Member, MembershipRegistry};
use crate::proposal::{
    Ballot, NewProposal, Proposal, ProposalConfig, ProposalRegistry, ProposalState, ProposalType,
    VoteChoice,
};
use crate::timelock::TimelockExecutor;
use crate::treasury::{Treasury, TreasuryCategory};
use crate::voting::{Tally, VotingEngine};

/// Everything the engine stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    pub members: MembershipRegistry,
    pub delegation: DelegationGraph,
    pub treasury: Treasury,
    pub proposals: ProposalRegistry,
    pub access: AccessGate,
    pub configs: TypeConfigs,
}

impl GovernanceState {
    pub fn new(config: &GovernanceConfig) -> Self {
        Self {
            members: MembershipRegistry::new(),
            delegation: DelegationGraph::new(),
            treasury: Treasury::new(config.limits.pairs()),
            proposals: ProposalRegistry::new(),
            access: AccessGate::new(config.admin),
            configs: config.proposals,
        }
    }
}

/// Outbound value owed once state has committed.
struct PendingTransfer {
    to: Principal,
    amount: Amount,
}

/// Held for the duration of one mutating call.
struct CallGuard<'a> {
    entered: ReentrantMutexGuard<'a, Cell<bool>>,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.entered.set(false);
    }
}

pub struct Governance {
    state: RwLock<GovernanceState>,
    serial: ReentrantMutex<Cell<bool>>,
    clock: Arc<dyn Clock>,
    transfer: Arc<dyn ValueTransfer>,
    events: Arc<dyn EventSink>,
}

impl Governance {
    pub fn new(
        config: GovernanceConfig,
        clock: Arc<dyn Clock>,
        transfer: Arc<dyn ValueTransfer>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        info!("Governance engine started with admin {}", config.admin);

        Ok(Self {
            state: RwLock::new(GovernanceState::new(&config)),
            serial: ReentrantMutex::new(Cell::new(false)),
            clock,
            transfer,
            events,
        })
    }

    fn enter(&self) -> Result<CallGuard<'_>, GovernanceError> {
        let entered = self.serial.lock();
        if entered.get() {
            return Err(GovernanceError::Reentrancy);
        }
        entered.set(true);
        Ok(CallGuard { entered })
    }

    /// Run a call that only touches internal state.
    fn mutate<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut GovernanceState, Timestamp) -> Result<(R, GovernanceEvent), GovernanceError>,
    ) -> Result<R, GovernanceError> {
        let _guard = self.enter()?;
        let now = self.clock.now();

        let result = {
            let mut state = self.state.write();
            f(&mut state, now)
        };

        match result {
            Ok((value, event)) => {
                self.emit(event);
                Ok(value)
            }
            Err(e) => {
                debug!(op, error = %e, "call rejected");
                Err(e)
            }
        }
    }

    /// Run a call that ends by sending value out.
    ///
    /// The call is applied to a staged copy. The live state only changes
    /// once the transfer has succeeded, so readers during the transfer
    /// (including the transfer itself) see the last committed state.
    fn mutate_then_transfer<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut GovernanceState, Timestamp) -> Result<(R, PendingTransfer, GovernanceEvent), GovernanceError>,
    ) -> Result<R, GovernanceError> {
        let _guard = self.enter()?;
        let now = self.clock.now();

        // Only callers holding the guard write, so the copy cannot go stale.
        let mut staged = self.state.read().clone();
        let (value, pending, event) = match f(&mut staged, now) {
            Ok(applied) => applied,
            Err(e) => {
                debug!(op, error = %e, "call rejected");
                return Err(e);
            }
        };

        if let Err(e) = self.transfer.transfer(pending.to, pending.amount) {
            warn!(op, to = %pending.to, amount = %pending.amount, error = %e, "transfer failed, discarding");
            return Err(GovernanceError::TransferFailed(e.to_string()));
        }

        *self.state.write() = staged;
        self.emit(event);
        Ok(value)
    }

    fn emit(&self, event: GovernanceEvent) {
        info!(event = event.name(), at = event.at(), "committed");
        self.events.emit(&event);
    }

    // ---- Membership ------------------------------------------------------

    /// Stake `amount`. The first deposit registers `principal` and grants
    /// it `Proposer`. Returns the new voting power.
    pub fn join(&self, principal: Principal, amount: Amount) -> Result<Amount, GovernanceError> {
        self.mutate("join", |state, now| {
            let change = state.members.join(principal, amount, now)?;
            let event = if change.first_deposit {
                state.access.grant(principal, Capability::Proposer);
                GovernanceEvent::Joined {
                    at: now,
                    principal,
                    stake: change.new_stake,
                    power: change.new_power,
                }
            } else {
                GovernanceEvent::StakeIncreased {
                    at: now,
                    principal,
                    amount,
                    stake: change.new_stake,
                    power: change.new_power,
                }
            };
            Ok((change.new_power, event))
        })
    }

    /// Unstake `amount` and send it back to `principal`.
    /// Returns the remaining stake.
    pub fn withdraw(&self, principal: Principal, amount: Amount) -> Result<Amount, GovernanceError> {
        self.mutate_then_transfer("withdraw", |state, now| {
            let change = state.members.withdraw(principal, amount)?;
            let event = GovernanceEvent::Withdrawn {
                at: now,
                principal,
                amount,
                stake: change.new_stake,
                power: change.new_power,
            };
            Ok((
                change.new_stake,
                PendingTransfer { to: principal, amount },
                event,
            ))
        })
    }

    // ---- Delegation ------------------------------------------------------

    /// Hand `from`'s voting power to `to`. Returns the power moved.
    pub fn delegate(&self, from: Principal, to: Principal) -> Result<Amount, GovernanceError> {
        self.mutate("delegate", |state, now| {
            let power = state.delegation.delegate(&mut state.members, from, to)?;
            Ok((power, GovernanceEvent::Delegated { at: now, from, to, power }))
        })
    }

    /// Take back `from`'s voting power. Returns the power returned.
    pub fn revoke_delegation(&self, from: Principal) -> Result<Amount, GovernanceError> {
        self.mutate("revoke_delegation", |state, now| {
            let (to, power) = state.delegation.revoke(&mut state.members, from)?;
            Ok((power, GovernanceEvent::DelegationRevoked { at: now, from, to, power }))
        })
    }

    // ---- Treasury --------------------------------------------------------

    /// Credit `amount` received from `from` to `category`.
    /// Returns the new pool balance.
    pub fn deposit(
        &self,
        from: Principal,
        category: TreasuryCategory,
        amount: Amount,
    ) -> Result<Amount, GovernanceError> {
        self.mutate("deposit", |state, now| {
            let balance = state.treasury.deposit(category, amount)?;
            Ok((
                balance,
                GovernanceEvent::TreasuryDeposited {
                    at: now,
                    from,
                    category,
                    amount,
                    balance,
                },
            ))
        })
    }

    /// Value sent without instructions lands in the Operational pool.
    pub fn receive(&self, from: Principal, amount: Amount) -> Result<Amount, GovernanceError> {
        self.deposit(from, TreasuryCategory::Operational, amount)
    }

    pub fn set_category_limit(
        &self,
        caller: Principal,
        category: TreasuryCategory,
        limit: Amount,
    ) -> Result<(), GovernanceError> {
        self.mutate("set_category_limit", |state, now| {
            state.access.require(&caller, Capability::Admin)?;
            state.treasury.set_limit(category, limit);
            Ok(((), GovernanceEvent::CategoryLimitSet { at: now, category, limit }))
        })
    }

    // ---- Administration --------------------------------------------------

    pub fn set_proposal_config(
        &self,
        caller: Principal,
        proposal_type: ProposalType,
        config: ProposalConfig,
    ) -> Result<(), GovernanceError> {
        self.mutate("set_proposal_config", |state, now| {
            state.access.require(&caller, Capability::Admin)?;
            config.validate()?;
            state.configs.set(proposal_type, config);
            Ok((
                (),
                GovernanceEvent::ProposalConfigSet {
                    at: now,
                    proposal_type,
                    config,
                },
            ))
        })
    }

    /// Grant a capability. Returns false if it was already held.
    pub fn grant_capability(
        &self,
        caller: Principal,
        principal: Principal,
        capability: Capability,
    ) -> Result<bool, GovernanceError> {
        self.mutate("grant_capability", |state, now| {
            state.access.require(&caller, Capability::Admin)?;
            if principal.is_null() {
                return Err(GovernanceError::InvalidPrincipal(
                    "cannot grant to the null principal".to_string(),
                ));
            }
            let added = state.access.grant(principal, capability);
            Ok((
                added,
                GovernanceEvent::CapabilityGranted {
                    at: now,
                    principal,
                    capability,
                },
            ))
        })
    }

    /// Revoke a capability. Returns false if it was not held.
    pub fn revoke_capability(
        &self,
        caller: Principal,
        principal: Principal,
        capability: Capability,
    ) -> Result<bool, GovernanceError> {
        self.mutate("revoke_capability", |state, now| {
            state.access.require(&caller, Capability::Admin)?;
            let removed = state.access.revoke(&principal, capability);
            Ok((
                removed,
                GovernanceEvent::CapabilityRevoked {
                    at: now,
                    principal,
                    capability,
                },
            ))
        })
    }

    // ---- Proposal lifecycle ----------------------------------------------

    /// Submit a proposal. It starts Pending.
    pub fn create_proposal(&self, params: NewProposal) -> Result<ProposalId, GovernanceError> {
        self.mutate("create_proposal", |state, now| {
            state.access.require(&params.proposer, Capability::Proposer)?;
            let stake = state.members.stake_of(&params.proposer);

            let (proposer, recipient, amount, proposal_type) =
                (params.proposer, params.recipient, params.amount, params.proposal_type);
            let id = state.proposals.create(params, stake, now)?;
            Ok((
                id,
                GovernanceEvent::ProposalCreated {
                    at: now,
                    id,
                    proposer,
                    recipient,
                    amount,
                    proposal_type,
                },
            ))
        })
    }

    /// Open voting. Only the proposer or a guardian may do this.
    /// Returns the end of the voting period.
    pub fn activate(&self, id: ProposalId, caller: Principal) -> Result<Timestamp, GovernanceError> {
        self.mutate("activate", |state, now| {
            let proposal = state.proposals.get(id)?;
            if proposal.state != ProposalState::Pending {
                return Err(GovernanceError::WrongState {
                    id,
                    state: proposal.state,
                });
            }
            if caller != proposal.proposer {
                state.access.require(&caller, Capability::Guardian)?;
            }

            let config = *state.configs.get(proposal.proposal_type);
            let end_time = state.proposals.get_mut(id)?.activate(&config, now)?;
            Ok((
                end_time,
                GovernanceEvent::ProposalActivated {
                    at: now,
                    id,
                    by: caller,
                    end_time,
                },
            ))
        })
    }

    /// Vote with the voter's current effective power.
    /// Returns the weight applied.
    pub fn cast_vote(
        &self,
        id: ProposalId,
        voter: Principal,
        choice: VoteChoice,
    ) -> Result<Amount, GovernanceError> {
        self.mutate("cast_vote", |state, now| {
            let weight = VotingEngine::cast_vote(&state.members, &mut state.proposals, id, voter, choice, now)?;
            Ok((
                weight,
                GovernanceEvent::VoteCast {
                    at: now,
                    id,
                    voter,
                    choice,
                    weight,
                },
            ))
        })
    }

    /// Close voting and decide. Anyone may call this once the period ends.
    pub fn resolve(&self, id: ProposalId) -> Result<ProposalState, GovernanceError> {
        self.mutate("resolve", |state, now| {
            let total_power = state.members.total_power();
            let proposal_type = state.proposals.get(id)?.proposal_type;
            let config = *state.configs.get(proposal_type);

            let proposal = state.proposals.get_mut(id)?;
            let outcome = proposal.resolve(&config, total_power, now)?;
            Ok((
                outcome,
                GovernanceEvent::ProposalResolved {
                    at: now,
                    id,
                    state: outcome,
                    for_votes: proposal.for_votes,
                    against_votes: proposal.against_votes,
                    abstain_votes: proposal.abstain_votes,
                },
            ))
        })
    }

    /// Stop an Active or Queued proposal.
    pub fn cancel(&self, id: ProposalId, guardian: Principal) -> Result<(), GovernanceError> {
        self.mutate("cancel", |state, now| {
            state.access.require(&guardian, Capability::Guardian)?;
            state.proposals.get_mut(id)?.cancel(now)?;
            Ok(((), GovernanceEvent::ProposalCancelled { at: now, id, by: guardian }))
        })
    }

    /// Release a queued proposal's funds once its timelock has elapsed.
    pub fn execute(&self, id: ProposalId, caller: Principal) -> Result<(), GovernanceError> {
        self.mutate_then_transfer("execute", |state, now| {
            state.access.require(&caller, Capability::Executor)?;
            let payout = TimelockExecutor::execute(
                &mut state.proposals,
                &mut state.treasury,
                &state.configs,
                id,
                now,
            )?;
            Ok((
                (),
                PendingTransfer {
                    to: payout.recipient,
                    amount: payout.amount,
                },
                GovernanceEvent::ProposalExecuted {
                    at: now,
                    id,
                    by: caller,
                    recipient: payout.recipient,
                    category: payout.category,
                    amount: payout.amount,
                },
            ))
        })
    }

    // ---- Queries ---------------------------------------------------------

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn member(&self, principal: &Principal) -> Option<Member> {
        self.state.read().members.get(principal).cloned()
    }

    pub fn effective_power(&self, principal: &Principal) -> Amount {
        self.state.read().members.effective_power(principal)
    }

    pub fn total_stake(&self) -> Amount {
        self.state.read().members.total_stake()
    }

    pub fn total_power(&self) -> Amount {
        self.state.read().members.total_power()
    }

    pub fn delegators_of(&self, principal: &Principal) -> Vec<Principal> {
        self.state.read().delegation.delegators_of(principal)
    }

    pub fn proposal(&self, id: ProposalId) -> Result<Proposal, GovernanceError> {
        self.state.read().proposals.get(id).cloned()
    }

    pub fn proposals_by_state(&self, proposal_state: ProposalState) -> Vec<ProposalId> {
        self.state
            .read()
            .proposals
            .by_state(proposal_state)
            .iter()
            .map(|p| p.id)
            .collect()
    }

    pub fn proposal_count(&self) -> usize {
        self.state.read().proposals.len()
    }

    pub fn ballot(&self, id: ProposalId, voter: &Principal) -> Result<Option<Ballot>, GovernanceError> {
        Ok(self.state.read().proposals.get(id)?.ballots.get(voter).copied())
    }

    pub fn tally(&self, id: ProposalId) -> Result<Tally, GovernanceError> {
        Ok(Tally::of(self.state.read().proposals.get(id)?))
    }

    pub fn treasury_balance(&self, category: TreasuryCategory) -> Amount {
        self.state.read().treasury.balance(category)
    }

    pub fn category_limit(&self, category: TreasuryCategory) -> Amount {
        self.state.read().treasury.limit(category)
    }

    pub fn total_balance(&self) -> Amount {
        self.state.read().treasury.total_balance()
    }

    pub fn proposal_config(&self, proposal_type: ProposalType) -> ProposalConfig {
        *self.state.read().configs.get(proposal_type)
    }

    pub fn has_capability(&self, principal: &Principal, capability: Capability) -> bool {
        self.state.read().access.has_capability(principal, capability)
    }

    /// Copy of the full committed state.
    pub fn snapshot(&self) -> GovernanceState {
        self.state.read().clone()
    }
}
