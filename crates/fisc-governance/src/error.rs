use fisc_ledger::LedgerError;
use fisc_types::{AssetId, Currency, GrantId, GroupId, Principal, ProposalId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GovernanceError>;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status: expected {expected}, found {found}")]
    InvalidStatus { expected: String, found: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Grant not found: {0}")]
    GrantNotFound(GrantId),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("Not a member of group {group}: {principal}")]
    MemberNotFound { group: GroupId, principal: Principal },

    #[error("No applicable rule: {0}")]
    RuleNotFound(String),

    #[error("Duplicate vote from {0}")]
    DuplicateVote(String),

    #[error("Voter has no voting power")]
    NoVotingPower,

    #[error("Voting period has ended")]
    VotingEnded,

    #[error("Voting period has not ended")]
    VotingNotEnded,

    #[error("Timelock active: claimable at {claimable_at}")]
    TimelockActive { claimable_at: i64 },

    #[error("No exchange rate configured for {0}")]
    RateUnavailable(Currency),

    #[error("Disbursement failed: {0}")]
    DisbursementFailed(String),

    #[error("Ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for GovernanceError {
    fn from(e: LedgerError) -> Self {
        match e {
            // Keep the dependency-missing condition distinguishable for callers.
            LedgerError::RateUnavailable(currency) => GovernanceError::RateUnavailable(currency),
            other => GovernanceError::Ledger(other),
        }
    }
}
