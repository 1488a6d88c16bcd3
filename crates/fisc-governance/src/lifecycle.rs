use crate::authorization::AuthorizationManager;
use crate::metrics;
use crate::types::{
    Authorization, AuthorizationTarget, Grant, NewGrant, RuleSpec, Status, VoteChoice,
    VotingStatus,
};
use crate::voting::{TallyEngine, TallyOutcome};
use crate::{GovernanceError, Result};
use chrono::Utc;
use fisc_ledger::CreditLedger;
use fisc_types::{GrantId, Principal, Sequence, VotePower};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Page size for grant listings.
pub const GRANT_PAGE_SIZE: usize = 20;

/// Configuration for grant and proposal lifecycle management
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Voting window opened by `start_voting`, in seconds
    pub grant_voting_period_secs: i64,
    /// Voting window opened by proposal creation, in seconds
    pub proposal_voting_period_secs: i64,
    /// Rule applied where no group or asset rule resolves
    pub default_rule: RuleSpec,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            grant_voting_period_secs: 7 * 24 * 3600, // 7 days
            proposal_voting_period_secs: 7 * 24 * 3600,
            default_rule: RuleSpec {
                threshold: 50,
                // A zero quorum would let a zero-vote tally pass vacuously.
                quorum: VotePower::from_raw(1),
                timelock_secs: None,
            },
        }
    }
}

impl LifecycleConfig {
    pub fn with_grant_voting_period(mut self, secs: i64) -> Self {
        self.grant_voting_period_secs = secs;
        self
    }

    pub fn with_proposal_voting_period(mut self, secs: i64) -> Self {
        self.proposal_voting_period_secs = secs;
        self
    }

    pub fn with_default_rule(mut self, rule: RuleSpec) -> Self {
        self.default_rule = rule;
        self
    }
}

/// Grant lifecycle manager
///
/// Owns every grant mutation: applications, review, voting windows,
/// finalization, cancellation, and claims. Mutations are serialized through
/// the grants write lock; reads run against the latest committed state.
pub struct GrantLifecycle {
    config: LifecycleConfig,
    credit: Arc<CreditLedger>,
    authorizations: Arc<AuthorizationManager>,
    admins: Arc<RwLock<HashSet<Principal>>>,
    grants: Arc<RwLock<HashMap<GrantId, Grant>>>,
    sequence: Sequence,
}

impl GrantLifecycle {
    pub fn new(
        config: LifecycleConfig,
        credit: Arc<CreditLedger>,
        authorizations: Arc<AuthorizationManager>,
    ) -> Self {
        Self {
            config,
            credit,
            authorizations,
            admins: Arc::new(RwLock::new(HashSet::new())),
            grants: Arc::new(RwLock::new(HashMap::new())),
            sequence: Sequence::new(1),
        }
    }

    /// Share a treasury-admin set owned by the caller.
    pub fn with_admins(mut self, admins: Arc<RwLock<HashSet<Principal>>>) -> Self {
        self.admins = admins;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub async fn is_admin(&self, principal: &Principal) -> bool {
        let admins = self.admins.read().await;
        admins.contains(principal)
    }

    /// Submit a new grant application. Open to any caller.
    pub async fn apply_grant(&self, applicant: Principal, new_grant: NewGrant) -> Result<GrantId> {
        if new_grant.title.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "grant title must not be empty".to_string(),
            ));
        }
        if new_grant.description.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "grant description must not be empty".to_string(),
            ));
        }
        if new_grant.category.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "grant category must not be empty".to_string(),
            ));
        }
        if new_grant.amount.is_zero() {
            return Err(GovernanceError::InvalidInput(
                "grant amount must be positive".to_string(),
            ));
        }

        let now = Utc::now().timestamp();
        let id = GrantId::new(self.sequence.next());
        let grant = Grant {
            id,
            applicant,
            title: new_grant.title,
            description: new_grant.description,
            category: new_grant.category,
            proofs: new_grant.proofs,
            amount: new_grant.amount,
            currency: new_grant.currency,
            recipient: new_grant.recipient,
            status: Status::Submitted,
            submitted_at: now,
            updated_at: now,
            voting: None,
            approved_at: None,
            claimable_at: None,
        };

        let mut grants = self.grants.write().await;
        grants.insert(id, grant.clone());

        metrics::ACTIVE_GRANTS.inc();
        info!(
            grant_id = %id,
            applicant = %applicant,
            category = %grant.category,
            amount = %grant.amount,
            currency = %grant.currency,
            "📜 Grant submitted"
        );

        Ok(id)
    }

    /// Move a submitted grant into review. Applicant or treasury admin only.
    pub async fn start_review(&self, caller: Principal, id: GrantId) -> Result<()> {
        let is_admin = self.is_admin(&caller).await;
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if caller != grant.applicant && !is_admin {
            return Err(GovernanceError::Unauthorized(
                "only the applicant or a treasury admin may start review".to_string(),
            ));
        }
        if grant.status != Status::Submitted {
            return Err(GovernanceError::InvalidStatus {
                expected: "submitted".to_string(),
                found: grant.effective_status(now).to_string(),
            });
        }

        self.transition(grant, Status::Review, now);
        info!(grant_id = %id, caller = %caller, "🔎 Grant moved to review");
        Ok(())
    }

    /// Open the voting window on a reviewed grant. Treasury admin only.
    pub async fn start_voting(&self, caller: Principal, id: GrantId) -> Result<()> {
        self.require_admin(&caller, "open grant voting").await?;
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if grant.status != Status::Review {
            return Err(GovernanceError::InvalidStatus {
                expected: "review".to_string(),
                found: grant.effective_status(now).to_string(),
            });
        }

        let end_time = now + self.config.grant_voting_period_secs;
        grant.voting = Some(VotingStatus::open(now, end_time));
        self.transition(grant, Status::Voting, now);

        info!(
            grant_id = %id,
            voting_ends = end_time,
            "🗳️ Grant voting opened"
        );
        Ok(())
    }

    /// Cast a weighted vote on a grant in its open voting window. The
    /// voter's current total power is snapshotted as the vote weight.
    pub async fn vote(&self, voter: Principal, id: GrantId, choice: VoteChoice) -> Result<()> {
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if grant.status != Status::Voting {
            return Err(GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: grant.effective_status(now).to_string(),
            });
        }

        let power = self.credit.power_of(&voter).await?;

        let voting = grant
            .voting
            .as_mut()
            .ok_or_else(|| GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: "voting window missing".to_string(),
            })?;

        TallyEngine::cast(voting, voter, choice, power, now)?;
        grant.updated_at = now;

        let ballot = match choice {
            VoteChoice::Approve => "approve",
            VoteChoice::Reject => "reject",
        };
        metrics::VOTES_CAST.with_label_values(&[ballot]).inc();
        info!(
            grant_id = %id,
            voter = %voter,
            ballot = ballot,
            power = %power,
            "🗳️ Vote cast"
        );

        Ok(())
    }

    /// Close an ended voting window and decide the grant against the default
    /// rule. Treasury admin only; callable only at or after the window end.
    pub async fn finalize_voting(&self, caller: Principal, id: GrantId) -> Result<Status> {
        self.require_admin(&caller, "finalize grant voting").await?;
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if grant.status != Status::Voting {
            return Err(GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: grant.effective_status(now).to_string(),
            });
        }
        let voting = grant
            .voting
            .as_ref()
            .ok_or_else(|| GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: "voting window missing".to_string(),
            })?;
        if !voting.has_ended(now) {
            return Err(GovernanceError::VotingNotEnded);
        }

        let rule = self.config.default_rule;
        let outcome = TallyEngine::evaluate(voting, &rule);
        let approval = voting.approval_power;
        let reject = voting.reject_power;
        let total = voting.total_power;

        let decided = if outcome.passed() {
            grant.approved_at = Some(now);
            grant.claimable_at = Some(now + rule.timelock_secs.unwrap_or(0));
            Status::Approved
        } else {
            Status::Rejected
        };
        self.transition(grant, decided, now);

        if let TallyOutcome::QuorumNotMet { cast, required } = outcome {
            warn!(
                grant_id = %id,
                cast = %cast,
                required = %required,
                "Quorum not met"
            );
        }

        metrics::VOTING_FINALIZED
            .with_label_values(&[outcome.label()])
            .inc();
        info!(
            grant_id = %id,
            result = %decided,
            approval = %approval,
            reject = %reject,
            total = %total,
            "📊 Grant voting finalized"
        );

        Ok(decided)
    }

    /// Administrative rejection before voting opens. Once a grant is in its
    /// voting window the tally is decided only by `finalize_voting`.
    pub async fn reject_grant(&self, caller: Principal, id: GrantId) -> Result<()> {
        self.require_admin(&caller, "reject a grant").await?;
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        let effective = grant.effective_status(now);
        if !matches!(effective, Status::Submitted | Status::Review) {
            return Err(GovernanceError::InvalidStatus {
                expected: "submitted or review".to_string(),
                found: effective.to_string(),
            });
        }

        self.transition(grant, Status::Rejected, now);
        info!(grant_id = %id, caller = %caller, "🚫 Grant rejected");
        Ok(())
    }

    /// Withdraw a grant before it reaches a decision. Applicant or treasury
    /// admin only. A voting grant whose window has closed reads as expired
    /// and can no longer be cancelled, only finalized.
    pub async fn cancel_grant(&self, caller: Principal, id: GrantId) -> Result<()> {
        let is_admin = self.is_admin(&caller).await;
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if caller != grant.applicant && !is_admin {
            return Err(GovernanceError::Unauthorized(
                "only the applicant or a treasury admin may cancel".to_string(),
            ));
        }

        let effective = grant.effective_status(now);
        if !matches!(effective, Status::Submitted | Status::Review | Status::Voting) {
            return Err(GovernanceError::InvalidStatus {
                expected: "submitted, review or voting".to_string(),
                found: effective.to_string(),
            });
        }

        self.transition(grant, Status::Cancelled, now);
        info!(grant_id = %id, caller = %caller, "🛑 Grant cancelled");
        Ok(())
    }

    /// Claim an approved grant: issues the disbursement authorization and
    /// closes the grant. Applicant only. Claiming again returns the original
    /// authorization instead of paying twice.
    pub async fn claim_grant(&self, caller: Principal, id: GrantId) -> Result<Authorization> {
        let now = Utc::now().timestamp();

        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;

        if caller != grant.applicant {
            return Err(GovernanceError::Unauthorized(
                "only the applicant may claim".to_string(),
            ));
        }

        let target = AuthorizationTarget::Grant(id);
        match grant.status {
            Status::Claimed => {
                // Replay of a completed claim: hand back the issued record.
                self.authorizations.existing(&target).await.ok_or_else(|| {
                    GovernanceError::InvalidStatus {
                        expected: "approved".to_string(),
                        found: "claimed without authorization record".to_string(),
                    }
                })
            }
            Status::Approved => {
                if let Some(claimable_at) = grant.claimable_at {
                    if now < claimable_at {
                        return Err(GovernanceError::TimelockActive { claimable_at });
                    }
                }

                let authorization = self
                    .authorizations
                    .issue(
                        target,
                        grant.recipient,
                        grant.amount,
                        Some(grant.currency),
                        None,
                    )
                    .await?;

                self.transition(grant, Status::Claimed, now);
                info!(
                    grant_id = %id,
                    authorization_id = %authorization.id,
                    recipient = %grant.recipient,
                    amount = %grant.amount,
                    "💸 Grant claimed"
                );

                Ok(authorization)
            }
            _ => Err(GovernanceError::InvalidStatus {
                expected: "approved".to_string(),
                found: grant.effective_status(now).to_string(),
            }),
        }
    }

    pub async fn get_grant(&self, id: GrantId) -> Option<Grant> {
        let grants = self.grants.read().await;
        grants.get(&id).cloned()
    }

    /// Grants whose read-time status is in `statuses` (empty set = all),
    /// ordered by id, one fixed-size page at `offset`.
    pub async fn grants_page(&self, statuses: &HashSet<Status>, offset: usize) -> Vec<Grant> {
        let now = Utc::now().timestamp();
        let grants = self.grants.read().await;

        let mut matching: Vec<Grant> = grants
            .values()
            .filter(|g| statuses.is_empty() || statuses.contains(&g.effective_status(now)))
            .cloned()
            .collect();
        matching.sort_by_key(|g| g.id);

        matching.into_iter().skip(offset).take(GRANT_PAGE_SIZE).collect()
    }

    pub async fn grants_of(&self, applicant: &Principal) -> Vec<Grant> {
        let grants = self.grants.read().await;
        let mut own: Vec<Grant> = grants
            .values()
            .filter(|g| g.applicant == *applicant)
            .cloned()
            .collect();
        own.sort_by_key(|g| g.id);
        own
    }

    pub async fn voting_status(&self, id: GrantId) -> Option<VotingStatus> {
        let grants = self.grants.read().await;
        grants.get(&id).and_then(|g| g.voting.clone())
    }

    pub async fn all_grants(&self) -> Vec<Grant> {
        let grants = self.grants.read().await;
        let mut all: Vec<Grant> = grants.values().cloned().collect();
        all.sort_by_key(|g| g.id);
        all
    }

    pub async fn grant_count(&self) -> usize {
        let grants = self.grants.read().await;
        grants.len()
    }

    async fn require_admin(&self, caller: &Principal, action: &str) -> Result<()> {
        if self.is_admin(caller).await {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized(format!(
                "only a treasury admin may {}",
                action
            )))
        }
    }

    fn transition(&self, grant: &mut Grant, to: Status, now: i64) {
        let from_label = grant.status.to_string();
        let to_label = to.to_string();
        metrics::GRANT_TRANSITIONS
            .with_label_values(&[from_label.as_str(), to_label.as_str()])
            .inc();
        if matches!(to, Status::Rejected | Status::Cancelled | Status::Claimed) {
            metrics::ACTIVE_GRANTS.dec();
        }
        grant.status = to;
        grant.updated_at = now;
    }

    /// Test helper: retro-date a grant's voting window end.
    /// Lets tests exercise closed-window behavior without sleeping.
    #[doc(hidden)]
    pub async fn test_set_voting_end(&self, id: GrantId, end_time: i64) -> Result<()> {
        let mut grants = self.grants.write().await;
        let grant = grants
            .get_mut(&id)
            .ok_or(GovernanceError::GrantNotFound(id))?;
        let voting = grant
            .voting
            .as_mut()
            .ok_or_else(|| GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: grant.status.to_string(),
            })?;
        voting.end_time = end_time;
        Ok(())
    }
}
