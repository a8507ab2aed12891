//! Monetary amounts in minor currency units.
//!
//! Single-currency by design. Amounts are non-negative integers of minor
//! units (cents), so arithmetic is exact; overflow is surfaced to the caller
//! rather than wrapped.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative monetary amount in minor currency units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(0);

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> u64 {
        self.0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Checked multiplication by a quantity. `None` on overflow.
    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(u64::from(quantity)).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<u64> for Money {
    fn from(n: u64) -> Self {
        Money(n)
    }
}
