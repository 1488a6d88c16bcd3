use fisc_governance::GovernanceError;
use fisc_ledger::LedgerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the engine facade. Domain errors pass through
/// unchanged so callers keep the full taxonomy; only identity resolution
/// adds a class of its own.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("identity resolution failed: {0}")]
    Identity(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Governance(#[from] GovernanceError),
}
