//! Segregated treasury pools.
//!
//! Three balances, one per risk tier, each capped by an admin-set limit.
//! Money leaves only through proposal execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tierfund_types::Amount;

use crate::error::GovernanceError;

/// Treasury pool. Each proposal type draws from exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TreasuryCategory {
    /// Long-horizon, high-conviction positions
    HighConviction,
    /// Small speculative bets
    Experimental,
    /// Running costs; default destination for unsolicited value
    Operational,
}

impl TreasuryCategory {
    pub const ALL: [TreasuryCategory; 3] = [
        TreasuryCategory::HighConviction,
        TreasuryCategory::Experimental,
        TreasuryCategory::Operational,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TreasuryCategory::HighConviction => "High Conviction",
            TreasuryCategory::Experimental => "Experimental",
            TreasuryCategory::Operational => "Operational",
        }
    }
}

/// Balance and cap for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAccount {
    pub balance: Amount,
    pub limit: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    accounts: BTreeMap<TreasuryCategory, CategoryAccount>,
}

impl Treasury {
    /// Create an empty treasury with the given per-category limits.
    pub fn new(limits: impl IntoIterator<Item = (TreasuryCategory, Amount)>) -> Self {
        let mut accounts: BTreeMap<_, _> = TreasuryCategory::ALL
            .iter()
            .map(|c| (*c, CategoryAccount::default()))
            .collect();
        for (category, limit) in limits {
            accounts.entry(category).or_default().limit = limit;
        }
        Self { accounts }
    }

    fn account(&self, category: TreasuryCategory) -> CategoryAccount {
        self.accounts.get(&category).copied().unwrap_or_default()
    }

    pub fn balance(&self, category: TreasuryCategory) -> Amount {
        self.account(category).balance
    }

    pub fn limit(&self, category: TreasuryCategory) -> Amount {
        self.account(category).limit
    }

    fn checked_total(&self) -> Option<Amount> {
        self.accounts
            .values()
            .try_fold(0, |total: Amount, a| total.checked_add(a.balance))
    }

    /// Sum of all pool balances. `deposit` keeps this within `Amount`.
    pub fn total_balance(&self) -> Amount {
        self.checked_total().unwrap_or(Amount::MAX)
    }

    /// Credit a pool. Fails if the pool would exceed its limit, or if the
    /// combined balance of all pools would overflow.
    pub fn deposit(&mut self, category: TreasuryCategory, amount: Amount) -> Result<Amount, GovernanceError> {
        if amount == 0 {
            return Err(GovernanceError::InvalidAmount);
        }
        self.checked_total()
            .and_then(|t| t.checked_add(amount))
            .ok_or(GovernanceError::Overflow)?;

        let account = self.account(category);
        let new_balance = account
            .balance
            .checked_add(amount)
            .filter(|b| *b <= account.limit)
            .ok_or(GovernanceError::ExceedsLimit {
                category,
                limit: account.limit,
                attempted: amount,
            })?;

        self.accounts.entry(category).or_default().balance = new_balance;
        Ok(new_balance)
    }

    /// Change a pool's cap. Lowering it below the current balance only
    /// blocks further deposits.
    pub fn set_limit(&mut self, category: TreasuryCategory, limit: Amount) {
        self.accounts.entry(category).or_default().limit = limit;
    }

    /// Take funds out of a pool.
    pub fn debit(&mut self, category: TreasuryCategory, amount: Amount) -> Result<Amount, GovernanceError> {
        let account = self.account(category);
        if account.balance < amount {
            return Err(GovernanceError::InsufficientFunds {
                category,
                available: account.balance,
                required: amount,
            });
        }

        let new_balance = account.balance - amount;
        self.accounts.entry(category).or_default().balance = new_balance;
        Ok(new_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treasury() -> Treasury {
        Treasury::new([
            (TreasuryCategory::HighConviction, 1_000),
            (TreasuryCategory::Experimental, 100),
            (TreasuryCategory::Operational, 500),
        ])
    }

    #[test]
    fn test_deposit_within_limit() {
        let mut treasury = treasury();
        assert_eq!(treasury.deposit(TreasuryCategory::Experimental, 60).unwrap(), 60);
        assert_eq!(treasury.deposit(TreasuryCategory::Experimental, 40).unwrap(), 100);
        assert_eq!(treasury.total_balance(), 100);
    }

    #[test]
    fn test_deposit_exceeding_limit_fails() {
        let mut treasury = treasury();
        treasury.deposit(TreasuryCategory::Experimental, 90).unwrap();

        let err = treasury.deposit(TreasuryCategory::Experimental, 11).unwrap_err();
        assert_eq!(
            err,
            GovernanceError::ExceedsLimit {
                category: TreasuryCategory::Experimental,
                limit: 100,
                attempted: 11,
            }
        );
        assert_eq!(treasury.balance(TreasuryCategory::Experimental), 90);
    }

    #[test]
    fn test_categories_are_segregated() {
        let mut treasury = treasury();
        treasury.deposit(TreasuryCategory::Operational, 500).unwrap();

        assert!(treasury.debit(TreasuryCategory::HighConviction, 1).is_err());
        assert_eq!(treasury.debit(TreasuryCategory::Operational, 200).unwrap(), 300);
        assert_eq!(treasury.balance(TreasuryCategory::HighConviction), 0);
        assert_eq!(treasury.total_balance(), 300);
    }

    #[test]
    fn test_debit_insufficient() {
        let mut treasury = treasury();
        treasury.deposit(TreasuryCategory::HighConviction, 10).unwrap();
        assert!(matches!(
            treasury.debit(TreasuryCategory::HighConviction, 11),
            Err(GovernanceError::InsufficientFunds { available: 10, required: 11, .. })
        ));
        assert_eq!(treasury.balance(TreasuryCategory::HighConviction), 10);
    }

    #[test]
    fn test_lowering_limit_blocks_deposits_only() {
        let mut treasury = treasury();
        treasury.deposit(TreasuryCategory::HighConviction, 800).unwrap();
        treasury.set_limit(TreasuryCategory::HighConviction, 500);

        assert_eq!(treasury.balance(TreasuryCategory::HighConviction), 800);
        assert!(treasury.deposit(TreasuryCategory::HighConviction, 1).is_err());
        assert!(treasury.debit(TreasuryCategory::HighConviction, 800).is_ok());
    }

    #[test]
    fn test_combined_balance_cannot_overflow() {
        let mut treasury = Treasury::new(TreasuryCategory::ALL.map(|c| (c, Amount::MAX)));
        let half = Amount::MAX / 2 + 1;

        treasury.deposit(TreasuryCategory::HighConviction, half).unwrap();
        assert_eq!(
            treasury.deposit(TreasuryCategory::Experimental, half),
            Err(GovernanceError::Overflow)
        );
        assert_eq!(treasury.balance(TreasuryCategory::Experimental), 0);

        treasury.deposit(TreasuryCategory::Experimental, half - 1).unwrap();
        assert_eq!(treasury.total_balance(), Amount::MAX);
    }
}
