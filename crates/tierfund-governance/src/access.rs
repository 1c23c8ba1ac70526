//! Capability gate for mutating entry points.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tierfund_types::Principal;

use crate::error::GovernanceError;

/// Capabilities a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// May submit proposals. Granted on first stake deposit.
    Proposer,
    /// May release funds for queued proposals.
    Executor,
    /// May cancel proposals and activate any pending proposal.
    Guardian,
    /// May change configuration and grant capabilities.
    Admin,
}

/// Capability store keyed by principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGate {
    grants: BTreeMap<Principal, BTreeSet<Capability>>,
}

impl AccessGate {
    /// Create a gate whose only grant is `Admin` for `admin`.
    pub fn new(admin: Principal) -> Self {
        let mut gate = Self::default();
        gate.grant(admin, Capability::Admin);
        gate
    }

    pub fn has_capability(&self, principal: &Principal, capability: Capability) -> bool {
        self.grants
            .get(principal)
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false)
    }

    /// Fail with `Unauthorized` unless `principal` holds `capability`.
    pub fn require(&self, principal: &Principal, capability: Capability) -> Result<(), GovernanceError> {
        if self.has_capability(principal, capability) {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized {
                principal: *principal,
                required: capability,
            })
        }
    }

    /// Add a capability. Returns false if it was already held.
    pub fn grant(&mut self, principal: Principal, capability: Capability) -> bool {
        self.grants.entry(principal).or_default().insert(capability)
    }

    /// Remove a capability. Returns false if it was not held.
    pub fn revoke(&mut self, principal: &Principal, capability: Capability) -> bool {
        let Some(caps) = self.grants.get_mut(principal) else {
            return false;
        };
        let removed = caps.remove(&capability);
        if caps.is_empty() {
            self.grants.remove(principal);
        }
        removed
    }

    /// Capabilities held by a principal, in declaration order.
    pub fn capabilities(&self, principal: &Principal) -> Vec<Capability> {
        self.grants
            .get(principal)
            .map(|caps| caps.iter().copied().collect())
            .unwrap_or_default()
    }
}
