//! Single-hop delegation of voting power.
//!
//! A member may hand its power to one delegatee. The delegatee's
//! `delegated_power_received` is kept equal to the sum of its delegators'
//! power at all times. Chains are refused: a delegatee cannot itself be
//! delegating, and a member holding delegations cannot delegate onward,
//! so no power is ever stranded in the middle of a chain.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal};

use crate::error::GovernanceError;
use crate::membership::MembershipRegistry;

/// Reverse index of active delegation edges. The forward edge lives on
/// the delegator's `Member::delegate_to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationGraph {
    /// delegatee -> delegators
    delegators: BTreeMap<Principal, BTreeSet<Principal>>,
}

impl DelegationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate all of `from`'s power to `to`.
    ///
    /// Returns the power moved.
    pub fn delegate(
        &mut self,
        members: &mut MembershipRegistry,
        from: Principal,
        to: Principal,
    ) -> Result<Amount, GovernanceError> {
        if to.is_null() {
            return Err(GovernanceError::InvalidPrincipal(
                "cannot delegate to the null principal".to_string(),
            ));
        }
        if from == to {
            return Err(GovernanceError::SelfDelegation);
        }

        let delegator = members.get(&from).ok_or(GovernanceError::NoStake)?;
        if delegator.stake == 0 {
            return Err(GovernanceError::NoStake);
        }
        if delegator.is_delegating() {
            return Err(GovernanceError::AlreadyDelegated);
        }
        if members.get(&to).map(|m| m.is_delegating()).unwrap_or(false) {
            return Err(GovernanceError::DelegationChain(to));
        }
        if self.has_delegators(&from) {
            return Err(GovernanceError::DelegationChain(from));
        }
        let power = delegator.power;

        if let Some(m) = members.get_mut(&from) {
            m.delegate_to = Some(to);
        }
        members.entry(to).delegated_power_received += power;
        self.delegators.entry(to).or_default().insert(from);

        Ok(power)
    }

    /// Revoke `from`'s delegation.
    ///
    /// Returns the former delegatee and the power returned.
    pub fn revoke(
        &mut self,
        members: &mut MembershipRegistry,
        from: Principal,
    ) -> Result<(Principal, Amount), GovernanceError> {
        let delegator = members.get(&from).ok_or(GovernanceError::NoActiveDelegation)?;
        let to = delegator.delegate_to.ok_or(GovernanceError::NoActiveDelegation)?;
        let power = delegator.power;

        if let Some(m) = members.get_mut(&from) {
            m.delegate_to = None;
        }
        let target = members.entry(to);
        target.delegated_power_received = target.delegated_power_received.saturating_sub(power);

        if let Some(set) = self.delegators.get_mut(&to) {
            set.remove(&from);
            if set.is_empty() {
                self.delegators.remove(&to);
            }
        }

        Ok((to, power))
    }

    /// Direct delegators of `delegatee`, ascending.
    pub fn delegators_of(&self, delegatee: &Principal) -> Vec<Principal> {
        self.delegators
            .get(delegatee)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_delegators(&self, principal: &Principal) -> bool {
        self.delegators
            .get(principal)
            .map(|set| !set.is_empty())
            .unwrap_or(false)
    }

    /// Recompute a delegatee's received power from its delegators' records.
    pub fn received_power(&self, members: &MembershipRegistry, delegatee: &Principal) -> Amount {
        self.delegators_of(delegatee)
            .iter()
            .map(|d| members.power_of(d))
            .sum()
    }
}
