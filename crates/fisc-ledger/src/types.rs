use fisc_types::{Currency, Principal, TokenAmount, VotePower};
use serde::{Deserialize, Serialize};

/// A credited donation. Donations are keyed by `(currency, tx_ref)` and are
/// immutable once credited: the voting power granted was computed from the
/// exchange rate in force at credit time and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub donor: Principal,
    pub currency: Currency,
    pub tx_ref: String,
    pub amount: TokenAmount,
    /// Exchange rate applied at credit time (token units per power unit).
    pub rate: u128,
    /// Voting power granted: `amount / rate`, truncated.
    pub power: VotePower,
    pub credited_at: i64,
}

/// Per-currency conversion rate: how many token units one unit of voting
/// power costs. Must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub currency: Currency,
    pub rate: u128,
    pub updated_at: i64,
}

/// Origin of a voting-power change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerSource {
    /// Power granted by a credited donation.
    Donation { currency: Currency, tx_ref: String },
    /// Manual administrative correction.
    Adjustment { memo: String },
}

/// One entry in an account's append-only power history. The cached per-account
/// total must always equal the sum of these deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerChange {
    pub source: PowerSource,
    /// Signed change; donations are never negative, adjustments may go
    /// either way but never below a zero balance.
    pub delta: i128,
    /// Account total immediately after this change was applied.
    pub power_after: VotePower,
    pub timestamp: i64,
}

/// Outcome of a full ledger consistency sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub accounts_checked: usize,
    pub donations_checked: usize,
    pub total_power: VotePower,
}
