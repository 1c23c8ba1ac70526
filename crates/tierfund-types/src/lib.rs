//! Tierfund Types - primitive types shared by the tierfund crates.
//!
//! - Principals (20-byte identities, Bech32m encoded)
//! - Amounts (unsigned value units)
//! - Timestamps (monotonic seconds)

pub mod principal;
pub mod error;

pub use principal::Principal;
pub use error::TypesError;

/// Value units for stake, treasury balances and transfers.
pub type Amount = u128;

/// Seconds on the monotonic governance clock.
pub type Timestamp = u64;

/// Proposal identifier. Zero is reserved and never assigned.
pub type ProposalId = u64;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Amount, Principal, ProposalId, Timestamp, TypesError};
}
