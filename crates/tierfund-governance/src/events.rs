//! Append-only audit log of committed transitions.
//!
//! Events are emitted after a call has fully committed. They play no part
//! in control flow.

use std::io::Write;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal, ProposalId, Timestamp};

use crate::access::Capability;
use crate::proposal::{ProposalConfig, ProposalState, ProposalType, VoteChoice};
use crate::treasury::TreasuryCategory;

/// A committed state transition and the parameters that caused it.
///
/// Serialized externally tagged (`{"joined": {...}}`) so amounts above
/// `u64::MAX` read back intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceEvent {
    Joined {
        at: Timestamp,
        principal: Principal,
        stake: Amount,
        power: Amount,
    },
    StakeIncreased {
        at: Timestamp,
        principal: Principal,
        amount: Amount,
        stake: Amount,
        power: Amount,
    },
    Withdrawn {
        at: Timestamp,
        principal: Principal,
        amount: Amount,
        stake: Amount,
        power: Amount,
    },
    Delegated {
        at: Timestamp,
        from: Principal,
        to: Principal,
        power: Amount,
    },
    DelegationRevoked {
        at: Timestamp,
        from: Principal,
        to: Principal,
        power: Amount,
    },
    TreasuryDeposited {
        at: Timestamp,
        from: Principal,
        category: TreasuryCategory,
        amount: Amount,
        balance: Amount,
    },
    CategoryLimitSet {
        at: Timestamp,
        category: TreasuryCategory,
        limit: Amount,
    },
    ProposalConfigSet {
        at: Timestamp,
        proposal_type: ProposalType,
        config: ProposalConfig,
    },
    CapabilityGranted {
        at: Timestamp,
        principal: Principal,
        capability: Capability,
    },
    CapabilityRevoked {
        at: Timestamp,
        principal: Principal,
        capability: Capability,
    },
    ProposalCreated {
        at: Timestamp,
        id: ProposalId,
        proposer: Principal,
        recipient: Principal,
        amount: Amount,
        proposal_type: ProposalType,
    },
    ProposalActivated {
        at: Timestamp,
        id: ProposalId,
        by: Principal,
        end_time: Timestamp,
    },
    VoteCast {
        at: Timestamp,
        id: ProposalId,
        voter: Principal,
        choice: VoteChoice,
        weight: Amount,
    },
    ProposalResolved {
        at: Timestamp,
        id: ProposalId,
        state: ProposalState,
        for_votes: Amount,
        against_votes: Amount,
        abstain_votes: Amount,
    },
    ProposalCancelled {
        at: Timestamp,
        id: ProposalId,
        by: Principal,
    },
    ProposalExecuted {
        at: Timestamp,
        id: ProposalId,
        by: Principal,
        recipient: Principal,
        category: TreasuryCategory,
        amount: Amount,
    },
}

impl GovernanceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GovernanceEvent::Joined { .. } => "joined",
            GovernanceEvent::StakeIncreased { .. } => "stake_increased",
            GovernanceEvent::Withdrawn { .. } => "withdrawn",
            GovernanceEvent::Delegated { .. } => "delegated",
            GovernanceEvent::DelegationRevoked { .. } => "delegation_revoked",
            GovernanceEvent::TreasuryDeposited { .. } => "treasury_deposited",
            GovernanceEvent::CategoryLimitSet { .. } => "category_limit_set",
            GovernanceEvent::ProposalConfigSet { .. } => "proposal_config_set",
            GovernanceEvent::CapabilityGranted { .. } => "capability_granted",
            GovernanceEvent::CapabilityRevoked { .. } => "capability_revoked",
            GovernanceEvent::ProposalCreated { .. } => "proposal_created",
            GovernanceEvent::ProposalActivated { .. } => "proposal_activated",
            GovernanceEvent::VoteCast { .. } => "vote_cast",
            GovernanceEvent::ProposalResolved { .. } => "proposal_resolved",
            GovernanceEvent::ProposalCancelled { .. } => "proposal_cancelled",
            GovernanceEvent::ProposalExecuted { .. } => "proposal_executed",
        }
    }

    /// Time of the call that produced this event.
    pub fn at(&self) -> Timestamp {
        match self {
            GovernanceEvent::Joined { at, .. }
            | GovernanceEvent::StakeIncreased { at, .. }
            | GovernanceEvent::Withdrawn { at, .. }
            | GovernanceEvent::Delegated { at, .. }
            | GovernanceEvent::DelegationRevoked { at, .. }
            | GovernanceEvent::TreasuryDeposited { at, .. }
            | GovernanceEvent::CategoryLimitSet { at, .. }
            | GovernanceEvent::ProposalConfigSet { at, .. }
            | GovernanceEvent::CapabilityGranted { at, .. }
            | GovernanceEvent::CapabilityRevoked { at, .. }
            | GovernanceEvent::ProposalCreated { at, .. }
            | GovernanceEvent::ProposalActivated { at, .. }
            | GovernanceEvent::VoteCast { at, .. }
            | GovernanceEvent::ProposalResolved { at, .. }
            | GovernanceEvent::ProposalCancelled { at, .. }
            | GovernanceEvent::ProposalExecuted { at, .. } => *at,
        }
    }
}

/// Destination for committed events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GovernanceEvent);
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<GovernanceEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GovernanceEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn last(&self) -> Option<GovernanceEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for MemoryEventLog {
    fn emit(&self, event: &GovernanceEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesEventLog<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesEventLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> EventSink for JsonLinesEventLog<W> {
    fn emit(&self, event: &GovernanceEvent) {
        let mut writer = self.writer.lock();
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(e) = written {
            tracing::warn!("Failed to write {} event: {}", event.name(), e);
        }
    }
}
