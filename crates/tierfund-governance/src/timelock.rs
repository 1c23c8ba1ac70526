//! Delayed, funded execution of queued proposals.

use tierfund_types::{Amount, Principal, ProposalId, Timestamp};

use crate::config::TypeConfigs;
use crate::error::GovernanceError;
use crate::proposal::{ProposalRegistry, ProposalState};
use crate::treasury::{Treasury, TreasuryCategory};

/// Funds released by an execution, still to be sent to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payout {
    pub id: ProposalId,
    pub recipient: Principal,
    pub category: TreasuryCategory,
    pub amount: Amount,
}

pub struct TimelockExecutor;

impl TimelockExecutor {
    /// Check that proposal `id` can be executed at `now`.
    pub fn check(
        proposals: &ProposalRegistry,
        treasury: &Treasury,
        configs: &TypeConfigs,
        id: ProposalId,
        now: Timestamp,
    ) -> Result<Payout, GovernanceError> {
        let proposal = proposals.get(id)?;
        if proposal.state != ProposalState::Queued {
            return Err(GovernanceError::WrongState {
                id,
                state: proposal.state,
            });
        }

        let config = configs.get(proposal.proposal_type);
        let ready_at = proposal
            .ready_at(config)
            .ok_or(GovernanceError::WrongState { id, state: proposal.state })?;
        if now < ready_at {
            return Err(GovernanceError::TimelockNotElapsed { ready_at });
        }

        let available = treasury.balance(proposal.category);
        if available < proposal.amount {
            return Err(GovernanceError::InsufficientTreasury {
                category: proposal.category,
                available,
                required: proposal.amount,
            });
        }

        Ok(Payout {
            id,
            recipient: proposal.recipient,
            category: proposal.category,
            amount: proposal.amount,
        })
    }

    /// Mark the proposal executed and debit its pool.
    ///
    /// Sending the payout is left to the caller, after this commits.
    pub fn execute(
        proposals: &mut ProposalRegistry,
        treasury: &mut Treasury,
        configs: &TypeConfigs,
        id: ProposalId,
        now: Timestamp,
    ) -> Result<Payout, GovernanceError> {
        let payout = Self::check(proposals, treasury, configs, id, now)?;

        treasury.debit(payout.category, payout.amount)?;
        proposals.get_mut(id)?.mark_executed(now)?;

        Ok(payout)
    }
}
