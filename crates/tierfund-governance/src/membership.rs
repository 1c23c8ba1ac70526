//! Stake and voting power bookkeeping per principal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tierfund_types::{Amount, Principal, Timestamp};

use crate::error::GovernanceError;
use crate::power::{voting_power, MAX_STAKE};

/// A principal's stake position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub principal: Principal,
    pub stake: Amount,
    /// Always `voting_power(stake)`
    pub power: Amount,
    pub delegate_to: Option<Principal>,
    /// Sum of `power` over every member whose `delegate_to` is this principal
    pub delegated_power_received: Amount,
    /// Set on first deposit. A principal that only receives delegations
    /// has a record but no join time.
    pub joined_at: Option<Timestamp>,
}

impl Member {
    fn new(principal: Principal) -> Self {
        Self {
            principal,
            ..Default::default()
        }
    }

    pub fn is_registered(&self) -> bool {
        self.joined_at.is_some()
    }

    pub fn is_delegating(&self) -> bool {
        self.delegate_to.is_some()
    }

    /// Power this member can cast: own power unless it is delegated away,
    /// plus everything delegated here.
    pub fn effective_power(&self) -> Amount {
        let own = if self.is_delegating() { 0 } else { self.power };
        own.saturating_add(self.delegated_power_received)
    }
}

/// Result of a stake deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeChange {
    pub first_deposit: bool,
    pub new_stake: Amount,
    pub new_power: Amount,
}

/// Registry of member records and system-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRegistry {
    members: BTreeMap<Principal, Member>,
    total_stake: Amount,
    total_power: Amount,
}

impl MembershipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, principal: &Principal) -> Option<&Member> {
        self.members.get(principal)
    }

    pub(crate) fn get_mut(&mut self, principal: &Principal) -> Option<&mut Member> {
        self.members.get_mut(principal)
    }

    /// Record for `principal`, created empty if missing.
    pub(crate) fn entry(&mut self, principal: Principal) -> &mut Member {
        self.members
            .entry(principal)
            .or_insert_with(|| Member::new(principal))
    }

    pub fn stake_of(&self, principal: &Principal) -> Amount {
        self.get(principal).map(|m| m.stake).unwrap_or(0)
    }

    pub fn power_of(&self, principal: &Principal) -> Amount {
        self.get(principal).map(|m| m.power).unwrap_or(0)
    }

    pub fn effective_power(&self, principal: &Principal) -> Amount {
        self.get(principal).map(Member::effective_power).unwrap_or(0)
    }

    pub fn total_stake(&self) -> Amount {
        self.total_stake
    }

    /// Sum of every member's own power. Quorum is measured against this.
    pub fn total_power(&self) -> Amount {
        self.total_power
    }

    /// Registered members, ascending by principal.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values().filter(|m| m.is_registered())
    }

    /// Add stake for `principal`.
    ///
    /// The power delta is forwarded to the delegatee if this member is
    /// currently delegating. All checks happen before any write.
    pub fn join(
        &mut self,
        principal: Principal,
        amount: Amount,
        now: Timestamp,
    ) -> Result<StakeChange, GovernanceError> {
        if amount == 0 {
            return Err(GovernanceError::InsufficientDeposit);
        }
        if principal.is_null() {
            return Err(GovernanceError::InvalidPrincipal(
                "null principal cannot stake".to_string(),
            ));
        }

        let (old_stake, old_power, delegate_to, first_deposit) = match self.get(&principal) {
            Some(m) => (m.stake, m.power, m.delegate_to, !m.is_registered()),
            None => (0, 0, None, true),
        };

        let new_stake = old_stake
            .checked_add(amount)
            .filter(|s| *s <= MAX_STAKE)
            .ok_or(GovernanceError::Overflow)?;
        let new_power = voting_power(new_stake);
        let power_delta = new_power - old_power;

        let total_stake = self
            .total_stake
            .checked_add(amount)
            .ok_or(GovernanceError::Overflow)?;
        let total_power = self
            .total_power
            .checked_add(power_delta)
            .ok_or(GovernanceError::Overflow)?;

        // Each power fits in 64 bits, so received totals stay far below
        // Amount::MAX and the forwarded delta cannot overflow.
        let member = self.entry(principal);
        member.stake = new_stake;
        member.power = new_power;
        if first_deposit {
            member.joined_at = Some(now);
        }
        self.total_stake = total_stake;
        self.total_power = total_power;

        if let Some(delegatee) = delegate_to {
            let target = self.entry(delegatee);
            target.delegated_power_received += power_delta;
        }

        Ok(StakeChange {
            first_deposit,
            new_stake,
            new_power,
        })
    }

    /// Remove stake from `principal`. Stake cannot move while delegated.
    pub fn withdraw(
        &mut self,
        principal: Principal,
        amount: Amount,
    ) -> Result<StakeChange, GovernanceError> {
        if amount == 0 {
            return Err(GovernanceError::InvalidAmount);
        }
        let member = self.get(&principal).ok_or(GovernanceError::InsufficientStake {
            available: 0,
            required: amount,
        })?;
        if amount > member.stake {
            return Err(GovernanceError::InsufficientStake {
                available: member.stake,
                required: amount,
            });
        }
        if member.is_delegating() {
            return Err(GovernanceError::DelegationActive);
        }

        let new_stake = member.stake - amount;
        let new_power = voting_power(new_stake);
        let power_delta = member.power - new_power;

        let member = self.entry(principal);
        member.stake = new_stake;
        member.power = new_power;
        self.total_stake -= amount;
        self.total_power -= power_delta;

        Ok(StakeChange {
            first_deposit: false,
            new_stake,
            new_power,
        })
    }
}
