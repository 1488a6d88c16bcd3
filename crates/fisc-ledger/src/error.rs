use fisc_types::{Currency, Principal, VotePower};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Transaction reference must not be empty")]
    EmptyTxRef,

    #[error("No exchange rate configured for {0}")]
    RateUnavailable(Currency),

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    #[error("Insufficient voting power for {account}: have {have}, adjustment requires {need}")]
    InsufficientPower {
        account: Principal,
        have: VotePower,
        need: VotePower,
    },

    #[error("Ledger integrity fault for {account}: cached {cached}, history sums to {recomputed}")]
    ConsistencyFault {
        account: Principal,
        cached: VotePower,
        recomputed: i128,
    },

    #[error("Ledger integrity fault: cached total {cached}, accounts sum to {recomputed}")]
    TotalDrift {
        cached: VotePower,
        recomputed: VotePower,
    },

    #[error("Storage error: {0}")]
    StorageError(String),
}
