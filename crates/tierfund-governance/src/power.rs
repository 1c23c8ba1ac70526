//! Stake to voting power transform.
//!
//! Voting power = floor(sqrt(stake * POWER_COEFFICIENT))
//!
//! The square root damps large stakes: a member staking 100x more than
//! another only gets 10x the say. The result feeds fund-release votes, so
//! it is computed with integer arithmetic only and must stay bit-identical
//! across implementations.

use tierfund_types::Amount;

/// Multiplier applied to stake before the square root.
pub const POWER_COEFFICIENT: Amount = 100;

/// Largest stake whose power can be computed without overflow.
pub const MAX_STAKE: Amount = Amount::MAX / POWER_COEFFICIENT;

/// Integer square root (Babylonian iteration).
/// Returns floor(sqrt(n)).
pub fn integer_sqrt(n: Amount) -> Amount {
    // ceil(n / 2) == (n + 1) / 2 without overflowing at Amount::MAX
    let mut z = n / 2 + (n & 1);
    let mut y = n;

    while z < y {
        y = z;
        z = (n / z + z) / 2;
    }

    y
}

/// Voting power granted by `stake`.
///
/// Callers keep stake at or below [`MAX_STAKE`]; beyond that the product
/// saturates.
pub fn voting_power(stake: Amount) -> Amount {
    integer_sqrt(stake.saturating_mul(POWER_COEFFICIENT))
}
