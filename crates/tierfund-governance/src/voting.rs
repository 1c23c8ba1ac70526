//! Ballot recording and tallies.
//!
//! A ballot carries the voter's effective power at the moment it is cast:
//! own power (unless delegated away) plus power delegated to the voter.

use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal, ProposalId, Timestamp};

use crate::error::GovernanceError;
use crate::membership::MembershipRegistry;
use crate::proposal::{Proposal, ProposalRegistry, VoteChoice};

/// Vote totals of one proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
}

impl Tally {
    pub fn of(proposal: &Proposal) -> Self {
        Self {
            for_votes: proposal.for_votes,
            against_votes: proposal.against_votes,
            abstain_votes: proposal.abstain_votes,
        }
    }

    /// All participation, abstentions included.
    pub fn total(&self) -> Amount {
        self.for_votes + self.against_votes + self.abstain_votes
    }

    /// Votes that count toward approval.
    pub fn decisive(&self) -> Amount {
        self.for_votes + self.against_votes
    }
}

/// Stateless voting rules over the member and proposal stores.
pub struct VotingEngine;

impl VotingEngine {
    /// Cast `voter`'s ballot on proposal `id`.
    ///
    /// Returns the weight applied to the tally.
    pub fn cast_vote(
        members: &MembershipRegistry,
        proposals: &mut ProposalRegistry,
        id: ProposalId,
        voter: Principal,
        choice: VoteChoice,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        let weight = Self::check_vote(members, proposals, id, &voter, now)?;
        proposals.get_mut(id)?.record_ballot(voter, choice, weight, now)?;
        Ok(weight)
    }

    /// Run every check `cast_vote` runs, without recording anything.
    pub fn check_vote(
        members: &MembershipRegistry,
        proposals: &ProposalRegistry,
        id: ProposalId,
        voter: &Principal,
        now: Timestamp,
    ) -> Result<Amount, GovernanceError> {
        proposals.get(id)?.check_votable(voter, now)?;

        let member = members.get(voter);
        if member.map(|m| m.is_delegating()).unwrap_or(false) {
            return Err(GovernanceError::DelegatedCannotVote);
        }
        let weight = member.map(|m| m.effective_power()).unwrap_or(0);
        if weight == 0 {
            return Err(GovernanceError::NoVotingPower);
        }
        Ok(weight)
    }
}
