//! External collaborators: the clock and the value-transfer primitive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use thiserror::Error;
use tierfund_types::{Amount, Principal, Timestamp};

/// Monotonic source of time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock in UNIX seconds, never moving backwards.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicU64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let previous = self.last.fetch_max(wall, Ordering::SeqCst);
        previous.max(wall)
    }
}

/// Clock moved by hand. Used by tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Move to `t`. Earlier values are ignored.
    pub fn set(&self, t: Timestamp) {
        self.now.fetch_max(t, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Failure reported by a value transfer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransferError {
    #[error("Transfer of {amount} to {to} rejected: {reason}")]
    Rejected {
        to: Principal,
        amount: Amount,
        reason: String,
    },

    #[error("Transfer backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves value out of the fund. Either completes or fails as a whole.
pub trait ValueTransfer: Send + Sync {
    fn transfer(&self, to: Principal, amount: Amount) -> Result<(), TransferError>;
}

/// In-memory ledger that records every outbound transfer.
#[derive(Debug, Default)]
pub struct LedgerTransfer {
    balances: Mutex<BTreeMap<Principal, Amount>>,
    history: Mutex<Vec<(Principal, Amount)>>,
}

impl LedgerTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total received by `principal`.
    pub fn balance_of(&self, principal: &Principal) -> Amount {
        self.balances.lock().get(principal).copied().unwrap_or(0)
    }

    /// Transfers in the order they happened.
    pub fn history(&self) -> Vec<(Principal, Amount)> {
        self.history.lock().clone()
    }
}

impl ValueTransfer for LedgerTransfer {
    fn transfer(&self, to: Principal, amount: Amount) -> Result<(), TransferError> {
        if to.is_null() {
            return Err(TransferError::Rejected {
                to,
                amount,
                reason: "null destination".to_string(),
            });
        }
        let mut balances = self.balances.lock();
        let balance = balances.entry(to).or_insert(0);
        *balance = balance.checked_add(amount).ok_or_else(|| TransferError::Rejected {
            to,
            amount,
            reason: "destination balance overflow".to_string(),
        })?;
        self.history.lock().push((to, amount));
        Ok(())
    }
}
