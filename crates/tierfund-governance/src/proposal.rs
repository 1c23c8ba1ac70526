//! Proposal lifecycle management.
//!
//! Pending -> Active -> Defeated | Queued -> Executed
//!
//! Active and Queued proposals can also be Cancelled by a guardian.
//! Proposals are never deleted; terminal records stay for audit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal, ProposalId, Timestamp};

use crate::error::GovernanceError;
use crate::treasury::TreasuryCategory;

/// Basis point denominator for quorum and approval thresholds.
pub const BASIS_POINTS: u64 = 10_000;

/// Minimum stake a proposer must hold at creation time.
pub const MIN_STAKE_TO_PROPOSE: Amount = 1;

const HOUR: u64 = 3_600;
const DAY: u64 = 24 * HOUR;

/// Proposal status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalState {
    /// Created, waiting for activation
    Pending,
    /// Voting is open
    Active,
    /// Voting ended without quorum or approval
    Defeated,
    /// Approved, waiting out the timelock
    Queued,
    /// Funds released
    Executed,
    /// Stopped by a guardian
    Cancelled,
}

impl ProposalState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalState::Defeated | ProposalState::Executed | ProposalState::Cancelled
        )
    }

    pub fn can_vote(&self) -> bool {
        matches!(self, ProposalState::Active)
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, ProposalState::Active | ProposalState::Queued)
    }
}

/// Risk tier of a funding proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalType {
    HighConviction,
    Experimental,
    Operational,
}

impl ProposalType {
    pub const ALL: [ProposalType; 3] = [
        ProposalType::HighConviction,
        ProposalType::Experimental,
        ProposalType::Operational,
    ];

    /// The one treasury pool this type may draw from.
    pub fn category(&self) -> TreasuryCategory {
        match self {
            ProposalType::HighConviction => TreasuryCategory::HighConviction,
            ProposalType::Experimental => TreasuryCategory::Experimental,
            ProposalType::Operational => TreasuryCategory::Operational,
        }
    }

    /// Initial voting parameters for this type.
    pub fn default_config(&self) -> ProposalConfig {
        match self {
            ProposalType::HighConviction => ProposalConfig {
                voting_period: 7 * DAY,
                quorum_bp: 2_000,   // 20%
                approval_bp: 6_000, // 60%
                timelock_delay: 48 * HOUR,
            },
            ProposalType::Experimental => ProposalConfig {
                voting_period: 5 * DAY,
                quorum_bp: 1_500,
                approval_bp: 5_000,
                timelock_delay: 24 * HOUR,
            },
            ProposalType::Operational => ProposalConfig {
                voting_period: 3 * DAY,
                quorum_bp: 1_500,
                approval_bp: 5_000,
                timelock_delay: 12 * HOUR,
            },
        }
    }
}

/// Voting parameters for one proposal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Seconds between activation and the end of voting
    pub voting_period: u64,
    /// Participation required, in basis points of total power
    pub quorum_bp: u64,
    /// Share of for+against that must be for, in basis points
    pub approval_bp: u64,
    /// Seconds between queueing and earliest execution
    pub timelock_delay: u64,
}

impl ProposalConfig {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.voting_period == 0 {
            return Err(GovernanceError::InvalidParameter(
                "voting_period must be greater than zero".to_string(),
            ));
        }
        if self.quorum_bp > BASIS_POINTS {
            return Err(GovernanceError::InvalidParameter(format!(
                "quorum_bp {} exceeds {}",
                self.quorum_bp, BASIS_POINTS
            )));
        }
        if self.approval_bp > BASIS_POINTS {
            return Err(GovernanceError::InvalidParameter(format!(
                "approval_bp {} exceeds {}",
                self.approval_bp, BASIS_POINTS
            )));
        }
        Ok(())
    }
}

/// Vote options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    For,
    Against,
    /// Counts toward quorum but not approval
    Abstain,
}

/// A recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub choice: VoteChoice,
    /// Effective power applied to the tally
    pub weight: Amount,
    pub cast_at: Timestamp,
}

/// A funding proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub proposer: Principal,
    pub recipient: Principal,
    pub amount: Amount,
    pub description: String,
    pub proposal_type: ProposalType,
    pub category: TreasuryCategory,
    pub state: ProposalState,
    pub created_at: Timestamp,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub queued_time: Option<Timestamp>,
    pub executed_time: Option<Timestamp>,
    pub cancelled_time: Option<Timestamp>,
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
    pub ballots: BTreeMap<Principal, Ballot>,
}

impl Proposal {
    pub fn total_votes(&self) -> Amount {
        self.for_votes + self.against_votes + self.abstain_votes
    }

    pub fn has_voted(&self, voter: &Principal) -> bool {
        self.ballots.contains_key(voter)
    }

    fn wrong_state(&self) -> GovernanceError {
        GovernanceError::WrongState {
            id: self.id,
            state: self.state,
        }
    }

    /// Open voting (Pending -> Active).
    pub fn activate(&mut self, config: &ProposalConfig, now: Timestamp) -> Result<Timestamp, GovernanceError> {
        if self.state != ProposalState::Pending {
            return Err(self.wrong_state());
        }
        let end = now
            .checked_add(config.voting_period)
            .ok_or(GovernanceError::Overflow)?;

        self.start_time = Some(now);
        self.end_time = Some(end);
        self.state = ProposalState::Active;
        Ok(end)
    }

    /// Check that `voter` may cast a ballot now. Does not look at power.
    pub fn check_votable(&self, voter: &Principal, now: Timestamp) -> Result<(), GovernanceError> {
        if !self.state.can_vote() {
            return Err(self.wrong_state());
        }
        let (start, end) = self.window().ok_or_else(|| self.wrong_state())?;
        if now < start {
            return Err(GovernanceError::NotStarted { starts_at: start });
        }
        if now > end {
            return Err(GovernanceError::PeriodEnded { ended_at: end });
        }
        if self.has_voted(voter) {
            return Err(GovernanceError::AlreadyVoted);
        }
        Ok(())
    }

    /// Record a ballot. The caller has already run `check_votable`.
    pub(crate) fn record_ballot(
        &mut self,
        voter: Principal,
        choice: VoteChoice,
        weight: Amount,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let tally = match choice {
            VoteChoice::For => &mut self.for_votes,
            VoteChoice::Against => &mut self.against_votes,
            VoteChoice::Abstain => &mut self.abstain_votes,
        };
        *tally = tally.checked_add(weight).ok_or(GovernanceError::Overflow)?;

        self.ballots.insert(
            voter,
            Ballot {
                choice,
                weight,
                cast_at: now,
            },
        );
        Ok(())
    }

    /// Close voting and decide the outcome (Active -> Queued | Defeated).
    pub fn resolve(
        &mut self,
        config: &ProposalConfig,
        total_power: Amount,
        now: Timestamp,
    ) -> Result<ProposalState, GovernanceError> {
        if self.state != ProposalState::Active {
            return Err(self.wrong_state());
        }
        let end = self.end_time.ok_or_else(|| self.wrong_state())?;
        if now <= end {
            return Err(GovernanceError::VotingStillOpen { ends_at: end });
        }

        let passed = outcome(
            self.for_votes,
            self.against_votes,
            self.abstain_votes,
            total_power,
            config,
        );

        if passed {
            self.state = ProposalState::Queued;
            self.queued_time = Some(now);
        } else {
            self.state = ProposalState::Defeated;
        }
        Ok(self.state)
    }

    /// Earliest execution time for a queued proposal.
    pub fn ready_at(&self, config: &ProposalConfig) -> Option<Timestamp> {
        self.queued_time
            .map(|q| q.saturating_add(config.timelock_delay))
    }

    /// Stop an Active or Queued proposal.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), GovernanceError> {
        if !self.state.is_cancellable() {
            return Err(self.wrong_state());
        }
        self.state = ProposalState::Cancelled;
        self.cancelled_time = Some(now);
        Ok(())
    }

    /// Mark a queued proposal as paid out.
    pub(crate) fn mark_executed(&mut self, now: Timestamp) -> Result<(), GovernanceError> {
        if self.state != ProposalState::Queued {
            return Err(self.wrong_state());
        }
        self.state = ProposalState::Executed;
        self.executed_time = Some(now);
        Ok(())
    }

    fn window(&self) -> Option<(Timestamp, Timestamp)> {
        Some((self.start_time?, self.end_time?))
    }
}

/// Quorum and approval arithmetic.
///
/// Fails when participation is below floor(total_power * quorum_bp / 10000),
/// when no decisive (for or against) votes were cast, or when
/// floor(for * 10000 / decisive) is below approval_bp.
pub fn outcome(
    for_votes: Amount,
    against_votes: Amount,
    abstain_votes: Amount,
    total_power: Amount,
    config: &ProposalConfig,
) -> bool {
    let bp = Amount::from(BASIS_POINTS);
    let total = for_votes
        .saturating_add(against_votes)
        .saturating_add(abstain_votes);
    let required_quorum = total_power.saturating_mul(Amount::from(config.quorum_bp)) / bp;
    if total < required_quorum {
        return false;
    }

    let decisive = for_votes.saturating_add(against_votes);
    if decisive == 0 {
        return false;
    }

    let approval = for_votes.saturating_mul(bp) / decisive;
    approval >= Amount::from(config.approval_bp)
}

/// Parameters of a new proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProposal {
    pub proposer: Principal,
    pub recipient: Principal,
    pub amount: Amount,
    pub description: String,
    pub proposal_type: ProposalType,
    pub category: TreasuryCategory,
}

/// Proposal registry managing all proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRegistry {
    proposals: BTreeMap<ProposalId, Proposal>,
    next_id: ProposalId,
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self {
            proposals: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Validate and store a new Pending proposal.
    pub fn create(
        &mut self,
        params: NewProposal,
        proposer_stake: Amount,
        now: Timestamp,
    ) -> Result<ProposalId, GovernanceError> {
        if proposer_stake < MIN_STAKE_TO_PROPOSE {
            return Err(GovernanceError::InsufficientStake {
                available: proposer_stake,
                required: MIN_STAKE_TO_PROPOSE,
            });
        }
        if params.recipient.is_null() {
            return Err(GovernanceError::InvalidRecipient);
        }
        if params.amount == 0 {
            return Err(GovernanceError::InvalidAmount);
        }
        if params.description.trim().is_empty() {
            return Err(GovernanceError::MissingDescription);
        }
        if params.category != params.proposal_type.category() {
            return Err(GovernanceError::CategoryMismatch {
                proposal_type: params.proposal_type,
                category: params.category,
            });
        }

        let id = self.next_id;
        let next_id = id.checked_add(1).ok_or(GovernanceError::Overflow)?;

        let proposal = Proposal {
            id,
            proposer: params.proposer,
            recipient: params.recipient,
            amount: params.amount,
            description: params.description,
            proposal_type: params.proposal_type,
            category: params.category,
            state: ProposalState::Pending,
            created_at: now,
            start_time: None,
            end_time: None,
            queued_time: None,
            executed_time: None,
            cancelled_time: None,
            for_votes: 0,
            against_votes: 0,
            abstain_votes: 0,
            ballots: BTreeMap::new(),
        };

        self.proposals.insert(id, proposal);
        self.next_id = next_id;
        Ok(id)
    }

    /// Look up a proposal. Id 0 is never assigned.
    pub fn get(&self, id: ProposalId) -> Result<&Proposal, GovernanceError> {
        if id == 0 {
            return Err(GovernanceError::NotFound(id));
        }
        self.proposals.get(&id).ok_or(GovernanceError::NotFound(id))
    }

    pub(crate) fn get_mut(&mut self, id: ProposalId) -> Result<&mut Proposal, GovernanceError> {
        if id == 0 {
            return Err(GovernanceError::NotFound(id));
        }
        self.proposals.get_mut(&id).ok_or(GovernanceError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Proposals in a given state, ascending by id.
    pub fn by_state(&self, state: ProposalState) -> Vec<&Proposal> {
        self.proposals
            .values()
            .filter(|p| p.state == state)
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Proposal> {
        self.proposals.values()
    }
}

impl Default for ProposalRegistry {
    fn default() -> Self {
        Self::new()
    }
}
