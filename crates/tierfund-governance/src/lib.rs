//! Tierfund governance engine.
//!
//! A staked treasury governed by its members:
//! - Stake buys square-root-damped voting power
//! - Members may hand their power to one delegate
//! - Proposals pay out of one of three treasury pools
//! - Passed proposals wait out a timelock before funds move

pub mod access;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod env;
pub mod error;
pub mod events;
pub mod membership;
pub mod power;
pub mod proposal;
pub mod telemetry;
pub mod timelock;
pub mod treasury;
pub mod voting;

pub use access::{AccessGate, Capability};
pub use config::{CategoryLimits, ConfigError, GovernanceConfig, TypeConfigs};
pub use delegation::DelegationGraph;
pub use engine::{Governance, GovernanceState};
pub use env::{Clock, LedgerTransfer, ManualClock, SystemClock, TransferError, ValueTransfer};
pub use error::{ErrorKind, GovernanceError};
pub use events::{EventSink, GovernanceEvent, JsonLinesEventLog, MemoryEventLog};
pub use membership::{Member, MembershipRegistry};
pub use power::{integer_sqrt, voting_power, MAX_STAKE, POWER_COEFFICIENT};
pub use proposal::{
    Ballot, NewProposal, Proposal, ProposalConfig, ProposalRegistry, ProposalState, ProposalType,
    VoteChoice, BASIS_POINTS, MIN_STAKE_TO_PROPOSE,
};
pub use telemetry::init_telemetry;
pub use timelock::{Payout, TimelockExecutor};
pub use treasury::{Treasury, TreasuryCategory};
pub use voting::{Tally, VotingEngine};

pub use tierfund_types::{Amount, Principal, ProposalId, Timestamp};
