//! Prometheus metrics for the credit ledger
//!
//! Tracks donation crediting, exchange-rate updates, power adjustments,
//! and integrity sweeps.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

/// Donations credited, by currency
pub static DONATIONS_CREDITED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_ledger_donations_credited_total",
        "Total donations credited",
        &["currency"]
    )
    .unwrap()
});

/// Replayed donation submissions answered from the ledger
pub static DUPLICATE_DONATION_REPLAYS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_ledger_duplicate_donation_replays_total",
        "Total donation submissions that matched an already-credited (currency, tx_ref) pair"
    )
    .unwrap()
});

/// Exchange rate updates, by currency
pub static RATE_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_ledger_rate_updates_total",
        "Total exchange rate updates",
        &["currency"]
    )
    .unwrap()
});

/// Administrative voting-power adjustments
pub static POWER_ADJUSTMENTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_ledger_power_adjustments_total",
        "Total administrative voting-power adjustments"
    )
    .unwrap()
});

/// Integrity sweeps, by result
pub static INTEGRITY_CHECKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_ledger_integrity_checks_total",
        "Total ledger integrity sweeps",
        &["result"]
    )
    .unwrap()
});
