use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount in the smallest unit of some currency (the currency itself is
/// carried alongside, never inside, the amount). u128 so that 18-decimal
/// tokens fit comfortably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn from_raw(units: u128) -> Self {
        Self(units)
    }

    pub fn to_raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical voting-power unit derived from donations. Kept distinct from
/// `TokenAmount` so currency units and vote weight never mix silently.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct VotePower(u128);

impl VotePower {
    pub const ZERO: Self = Self(0);

    pub fn from_raw(units: u128) -> Self {
        Self(units)
    }

    pub fn to_raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(&self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(&self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Apply a signed delta, failing on underflow or overflow.
    pub fn checked_add_signed(&self, delta: i128) -> Option<Self> {
        if delta >= 0 {
            self.0.checked_add(delta as u128).map(Self)
        } else {
            self.0.checked_sub(delta.unsigned_abs()).map(Self)
        }
    }
}

impl fmt::Display for VotePower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
