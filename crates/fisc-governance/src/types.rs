use fisc_types::{
    AssetId, AuthorizationId, Currency, GrantId, GroupId, LifecycleState, Principal, ProposalId,
    RuleId, TokenAmount, VotePower,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Lifecycle status shared by grants and group proposals.
///
/// `Expired` is never stored: it is derived at read time for a voting entity
/// whose window closed without finalization. Finalization remains the only
/// mutator out of that condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Submitted,
    Review,
    Voting,
    Approved,
    Rejected,
    Cancelled,
    Expired,
    Claimed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Submitted => "submitted",
            Status::Review => "review",
            Status::Voting => "voting",
            Status::Approved => "approved",
            Status::Rejected => "rejected",
            Status::Cancelled => "cancelled",
            Status::Expired => "expired",
            Status::Claimed => "claimed",
        };
        write!(f, "{}", label)
    }
}

impl LifecycleState for Status {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::Rejected | Status::Cancelled | Status::Expired | Status::Claimed
        )
    }

    fn can_transition_to(&self, next: &Self) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Submitted, Review)
                | (Submitted, Rejected)
                | (Submitted, Cancelled)
                | (Review, Voting)
                | (Review, Rejected)
                | (Review, Cancelled)
                | (Voting, Approved)
                | (Voting, Rejected)
                | (Voting, Cancelled)
                | (Approved, Claimed)
        )
    }
}

/// Ballot choice for a weighted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    Approve,
    Reject,
}

/// A cast vote. The weight is the voter's total power snapshotted at cast
/// time; later power changes never alter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Principal,
    pub choice: VoteChoice,
    pub power: VotePower,
    pub timestamp: i64,
}

/// Open or closed voting window with its running tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub start_time: i64,
    pub end_time: i64,
    pub votes: Vec<Vote>,
    /// Fast duplicate-vote rejection; mirrors `votes`.
    pub voters: HashSet<Principal>,
    pub approval_power: VotePower,
    pub reject_power: VotePower,
    pub total_power: VotePower,
}

impl VotingStatus {
    pub fn open(start_time: i64, end_time: i64) -> Self {
        Self {
            start_time,
            end_time,
            votes: Vec::new(),
            voters: HashSet::new(),
            approval_power: VotePower::ZERO,
            reject_power: VotePower::ZERO,
            total_power: VotePower::ZERO,
        }
    }

    pub fn is_open(&self, now: i64) -> bool {
        now >= self.start_time && now < self.end_time
    }

    pub fn has_ended(&self, now: i64) -> bool {
        now >= self.end_time
    }

    pub fn has_voted(&self, voter: &Principal) -> bool {
        self.voters.contains(voter)
    }
}

/// Application fields for a new grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrant {
    pub title: String,
    pub description: String,
    pub category: String,
    /// Free-form references backing the request (links, document hashes).
    pub proofs: Vec<String>,
    pub amount: TokenAmount,
    pub currency: Currency,
    pub recipient: Principal,
}

/// A treasury grant request moving through the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub applicant: Principal,
    pub title: String,
    pub description: String,
    pub category: String,
    pub proofs: Vec<String>,
    pub amount: TokenAmount,
    pub currency: Currency,
    pub recipient: Principal,
    pub status: Status,
    pub submitted_at: i64,
    pub updated_at: i64,
    pub voting: Option<VotingStatus>,
    pub approved_at: Option<i64>,
    /// Earliest claim time once approved; equals `approved_at` when the
    /// deciding rule carries no timelock.
    pub claimable_at: Option<i64>,
}

impl Grant {
    /// Status as observed at `now`: a voting grant whose window closed
    /// without finalization reads as expired.
    pub fn effective_status(&self, now: i64) -> Status {
        if self.status == Status::Voting {
            if let Some(voting) = &self.voting {
                if voting.has_ended(now) {
                    return Status::Expired;
                }
            }
        }
        self.status
    }
}

/// Role a member holds within a governance group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Voter,
    Proposer,
}

/// Group membership row. Re-adding a member merges roles by union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub principal: Principal,
    pub roles: HashSet<Role>,
    pub joined_at: i64,
}

/// Governance group owning assets, rules, and proposals.
#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub members: HashMap<Principal, Member>,
    pub created_at: i64,
}

impl Group {
    pub fn has_role(&self, principal: &Principal, role: Role) -> bool {
        self.members
            .get(principal)
            .map(|m| m.roles.contains(&role))
            .unwrap_or(false)
    }
}

/// Asset category: held natively by the treasury or referenced externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Native,
    External,
}

/// Registration fields for a new asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub kind: AssetKind,
    pub asset_type: String,
    pub description: String,
    pub canister_ref: Option<String>,
    pub token_ref: Option<String>,
    /// Free-form policy text; not interpreted by the engine.
    pub constraints: Option<String>,
}

/// An asset registered with a group, against which proposals disburse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub group_id: GroupId,
    pub kind: AssetKind,
    pub asset_type: String,
    pub description: String,
    pub canister_ref: Option<String>,
    pub token_ref: Option<String>,
    /// Free-form policy text; not interpreted by the engine.
    pub constraints: Option<String>,
    pub registered_at: i64,
}

/// The voting parameters a tally is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Required approval percentage of cast power, in (0, 100].
    pub threshold: u32,
    /// Minimum total cast power for the vote to count.
    pub quorum: VotePower,
    /// Delay between approval and claimability, if any.
    pub timelock_secs: Option<i64>,
}

/// One immutable version in the append-only rule history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub group_id: GroupId,
    /// `None` makes this the group default; a value scopes it to one asset.
    pub asset_id: Option<AssetId>,
    pub spec: RuleSpec,
    pub created_at: i64,
}

/// Creation fields for a new disbursement proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProposal {
    pub asset_id: AssetId,
    pub purpose: String,
    pub payee: Principal,
    pub amount: TokenAmount,
    pub evidence_hash: Option<String>,
    /// Rule version the proposer asks to be judged by.
    pub requested_rule: Option<RuleId>,
}

/// A disbursement proposal raised by a group against a registered asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub group_id: GroupId,
    pub proposer: Principal,
    pub asset_id: AssetId,
    pub purpose: String,
    pub payee: Principal,
    pub amount: TokenAmount,
    pub evidence_hash: Option<String>,
    /// Rule the proposer asked to be judged by, if any; the effective rule
    /// is still resolved at finalization.
    pub requested_rule: Option<RuleId>,
    /// Rule that actually decided the vote, recorded at finalization.
    pub decided_by_rule: Option<RuleId>,
    pub status: Status,
    pub created_at: i64,
    pub updated_at: i64,
    pub voting: VotingStatus,
    pub approved_at: Option<i64>,
    pub claimable_at: Option<i64>,
}

impl Proposal {
    pub fn effective_status(&self, now: i64) -> Status {
        if self.status == Status::Voting && self.voting.has_ended(now) {
            return Status::Expired;
        }
        self.status
    }
}

/// What an authorization disburses for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationTarget {
    Grant(GrantId),
    Proposal(ProposalId),
}

impl fmt::Display for AuthorizationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationTarget::Grant(id) => write!(f, "grant/{}", id),
            AuthorizationTarget::Proposal(id) => write!(f, "proposal/{}", id),
        }
    }
}

/// Issued disbursement authorization. Deterministically derived from its
/// target, so re-issuing for the same target yields the identical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: AuthorizationId,
    pub target: AuthorizationTarget,
    pub recipient: Principal,
    pub amount: TokenAmount,
    /// Set for grant disbursements.
    pub currency: Option<Currency>,
    /// Set for proposal disbursements.
    pub asset_id: Option<AssetId>,
    pub issued_at: i64,
}

#[cfg(test)]
mod status_tests {
    use super::*;

    const ALL: [Status; 8] = [
        Status::Submitted,
        Status::Review,
        Status::Voting,
        Status::Approved,
        Status::Rejected,
        Status::Cancelled,
        Status::Expired,
        Status::Claimed,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(!Status::Submitted.is_terminal());
        assert!(!Status::Review.is_terminal());
        assert!(!Status::Voting.is_terminal());
        assert!(!Status::Approved.is_terminal());
        assert!(Status::Rejected.is_terminal());
        assert!(Status::Cancelled.is_terminal());
        assert!(Status::Expired.is_terminal());
        assert!(Status::Claimed.is_terminal());
    }

    #[test]
    fn test_submitted_transitions() {
        assert!(Status::Submitted.can_transition_to(&Status::Review));
        assert!(Status::Submitted.can_transition_to(&Status::Rejected));
        assert!(Status::Submitted.can_transition_to(&Status::Cancelled));
        assert!(!Status::Submitted.can_transition_to(&Status::Voting));
        assert!(!Status::Submitted.can_transition_to(&Status::Approved));
        assert!(!Status::Submitted.can_transition_to(&Status::Claimed));
    }

    #[test]
    fn test_review_transitions() {
        assert!(Status::Review.can_transition_to(&Status::Voting));
        assert!(Status::Review.can_transition_to(&Status::Rejected));
        assert!(Status::Review.can_transition_to(&Status::Cancelled));
        assert!(!Status::Review.can_transition_to(&Status::Approved));
        assert!(!Status::Review.can_transition_to(&Status::Submitted));
    }

    #[test]
    fn test_voting_transitions() {
        assert!(Status::Voting.can_transition_to(&Status::Approved));
        assert!(Status::Voting.can_transition_to(&Status::Rejected));
        assert!(Status::Voting.can_transition_to(&Status::Cancelled));
        assert!(!Status::Voting.can_transition_to(&Status::Review));
        assert!(!Status::Voting.can_transition_to(&Status::Claimed));
        // Expiry is derived at read time, never a stored transition.
        assert!(!Status::Voting.can_transition_to(&Status::Expired));
    }

    #[test]
    fn test_approved_only_admits_claim() {
        assert!(Status::Approved.can_transition_to(&Status::Claimed));
        for next in ALL {
            if next != Status::Claimed {
                assert!(
                    !Status::Approved.can_transition_to(&next),
                    "approved must not admit {:?}",
                    next
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        for terminal in [
            Status::Rejected,
            Status::Cancelled,
            Status::Expired,
            Status::Claimed,
        ] {
            for next in ALL {
                assert!(
                    !terminal.can_transition_to(&next),
                    "{:?} must not admit {:?}",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_effective_status_derives_expired() {
        let mut grant = Grant {
            id: GrantId::new(1),
            applicant: Principal::from_bytes([1; 32]),
            title: "t".to_string(),
            description: "d".to_string(),
            category: "c".to_string(),
            proofs: vec![],
            amount: TokenAmount::from_raw(10),
            currency: Currency::Icp,
            recipient: Principal::from_bytes([2; 32]),
            status: Status::Voting,
            submitted_at: 1_000,
            updated_at: 1_000,
            voting: Some(VotingStatus::open(1_000, 2_000)),
            approved_at: None,
            claimable_at: None,
        };

        assert_eq!(grant.effective_status(1_500), Status::Voting);
        assert_eq!(grant.effective_status(2_000), Status::Expired);
        // The stored status is untouched.
        assert_eq!(grant.status, Status::Voting);

        grant.status = Status::Approved;
        assert_eq!(grant.effective_status(9_999), Status::Approved);
    }
}
