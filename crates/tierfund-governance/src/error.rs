use thiserror::Error;
use tierfund_types::{Amount, Principal, ProposalId, Timestamp};

use crate::access::Capability;
use crate::proposal::{ProposalState, ProposalType};
use crate::treasury::TreasuryCategory;

/// Coarse classification of a rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// Missing capability or wrong caller
    Authorization,
    /// Lifecycle, voting window, delegation or timelock conflict
    State,
    /// Not enough stake, funds or headroom
    Resource,
}

/// Errors that can occur in governance operations.
///
/// A call that returns any of these has left the engine untouched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Deposit must be greater than zero")]
    InsufficientDeposit,

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Recipient must not be the null principal")]
    InvalidRecipient,

    #[error("Proposal amount must be greater than zero")]
    InvalidAmount,

    #[error("Proposal description is empty")]
    MissingDescription,

    #[error("Category {category:?} cannot fund a {proposal_type:?} proposal")]
    CategoryMismatch {
        proposal_type: ProposalType,
        category: TreasuryCategory,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unauthorized: {principal} lacks {required:?}")]
    Unauthorized {
        principal: Principal,
        required: Capability,
    },

    #[error("Proposal not found: {0}")]
    NotFound(ProposalId),

    #[error("Proposal {id} is {state:?}")]
    WrongState { id: ProposalId, state: ProposalState },

    #[error("Voting has not started (starts at {starts_at})")]
    NotStarted { starts_at: Timestamp },

    #[error("Voting period ended at {ended_at}")]
    PeriodEnded { ended_at: Timestamp },

    #[error("Voting still open until {ends_at}")]
    VotingStillOpen { ends_at: Timestamp },

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Delegating principals cannot vote")]
    DelegatedCannotVote,

    #[error("Timelock not elapsed (ready at {ready_at})")]
    TimelockNotElapsed { ready_at: Timestamp },

    #[error("Self-delegation not allowed")]
    SelfDelegation,

    #[error("Already delegating")]
    AlreadyDelegated,

    #[error("No active delegation")]
    NoActiveDelegation,

    #[error("Stake is locked while a delegation is active")]
    DelegationActive,

    #[error("Delegation would create a chain through {0}")]
    DelegationChain(Principal),

    #[error("Call rejected: another mutating call is in progress")]
    Reentrancy,

    #[error("Insufficient stake: have {available}, need {required}")]
    InsufficientStake { available: Amount, required: Amount },

    #[error("Cannot delegate without stake")]
    NoStake,

    #[error("No voting power")]
    NoVotingPower,

    #[error("Deposit of {attempted} exceeds {category:?} limit {limit}")]
    ExceedsLimit {
        category: TreasuryCategory,
        limit: Amount,
        attempted: Amount,
    },

    #[error("Insufficient funds in {category:?}: have {available}, need {required}")]
    InsufficientFunds {
        category: TreasuryCategory,
        available: Amount,
        required: Amount,
    },

    #[error("Treasury cannot fund proposal: {category:?} has {available}, needs {required}")]
    InsufficientTreasury {
        category: TreasuryCategory,
        available: Amount,
        required: Amount,
    },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Transfer failed: {0}")]
    TransferFailed(String),
}

impl GovernanceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use GovernanceError::*;
        match self {
            InsufficientDeposit
            | InvalidPrincipal(_)
            | InvalidRecipient
            | InvalidAmount
            | MissingDescription
            | CategoryMismatch { .. }
            | InvalidParameter(_) => ErrorKind::Validation,

            Unauthorized { .. } => ErrorKind::Authorization,

            NotFound(_)
            | WrongState { .. }
            | NotStarted { .. }
            | PeriodEnded { .. }
            | VotingStillOpen { .. }
            | AlreadyVoted
            | DelegatedCannotVote
            | TimelockNotElapsed { .. }
            | SelfDelegation
            | AlreadyDelegated
            | NoActiveDelegation
            | DelegationActive
            | DelegationChain(_)
            | Reentrancy => ErrorKind::State,

            InsufficientStake { .. }
            | NoStake
            | NoVotingPower
            | ExceedsLimit { .. }
            | InsufficientFunds { .. }
            | InsufficientTreasury { .. }
            | Overflow
            | TransferFailed(_) => ErrorKind::Resource,
        }
    }
}
