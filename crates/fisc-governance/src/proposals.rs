use crate::authorization::AuthorizationManager;
use crate::lifecycle::LifecycleConfig;
use crate::metrics;
use crate::registry::GovernanceRegistry;
use crate::types::{
    Authorization, AuthorizationTarget, NewProposal, Proposal, Role, RuleSpec, Status, VoteChoice,
    VotingStatus,
};
use crate::voting::TallyEngine;
use crate::{GovernanceError, Result};
use chrono::Utc;
use fisc_ledger::CreditLedger;
use fisc_types::{Principal, ProposalId, RuleId, Sequence};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Manager for group disbursement proposals.
///
/// Unlike grants, proposals skip the review stage: creation opens the voting
/// window immediately. Finalization resolves the governing rule at decision
/// time, preferring the proposer's requested rule version, then the
/// registry's effective rule for the asset, then the system default.
pub struct ProposalManager {
    config: LifecycleConfig,
    registry: Arc<GovernanceRegistry>,
    credit: Arc<CreditLedger>,
    authorizations: Arc<AuthorizationManager>,
    proposals: Arc<RwLock<HashMap<ProposalId, Proposal>>>,
    sequence: Sequence,
}

impl ProposalManager {
    pub fn new(
        config: LifecycleConfig,
        registry: Arc<GovernanceRegistry>,
        credit: Arc<CreditLedger>,
        authorizations: Arc<AuthorizationManager>,
    ) -> Self {
        Self {
            config,
            registry,
            credit,
            authorizations,
            proposals: Arc::new(RwLock::new(HashMap::new())),
            sequence: Sequence::new(1),
        }
    }

    /// Raise a proposal against a registered asset and open its voting
    /// window. Requires the proposer or admin role in the asset's group.
    pub async fn create(&self, caller: Principal, new: NewProposal) -> Result<ProposalId> {
        if new.purpose.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "proposal purpose must not be empty".to_string(),
            ));
        }
        if new.amount.is_zero() {
            return Err(GovernanceError::InvalidInput(
                "proposal amount must be positive".to_string(),
            ));
        }

        let asset = self
            .registry
            .get_asset(new.asset_id)
            .await
            .ok_or(GovernanceError::AssetNotFound(new.asset_id))?;
        self.registry
            .authorize(
                asset.group_id,
                &caller,
                &[Role::Proposer, Role::Admin],
                "create proposals",
            )
            .await?;

        if let Some(rule_id) = new.requested_rule {
            let rule = self
                .registry
                .get_rule(rule_id)
                .await
                .ok_or_else(|| GovernanceError::RuleNotFound(rule_id.to_string()))?;
            if rule.group_id != asset.group_id {
                return Err(GovernanceError::InvalidInput(format!(
                    "rule {} belongs to another group",
                    rule_id
                )));
            }
        }

        let now = Utc::now().timestamp();
        let id = ProposalId::new(self.sequence.next());
        let end_time = now + self.config.proposal_voting_period_secs;
        let proposal = Proposal {
            id,
            group_id: asset.group_id,
            proposer: caller,
            asset_id: new.asset_id,
            purpose: new.purpose,
            payee: new.payee,
            amount: new.amount,
            evidence_hash: new.evidence_hash,
            requested_rule: new.requested_rule,
            decided_by_rule: None,
            status: Status::Voting,
            created_at: now,
            updated_at: now,
            voting: VotingStatus::open(now, end_time),
            approved_at: None,
            claimable_at: None,
        };

        let mut proposals = self.proposals.write().await;
        proposals.insert(id, proposal);

        metrics::PROPOSALS_CREATED.inc();
        info!(
            proposal_id = %id,
            group_id = %asset.group_id,
            asset_id = %new.asset_id,
            proposer = %caller,
            voting_ends = end_time,
            "📜 Proposal created"
        );
        Ok(id)
    }

    /// Cast a weighted vote. Requires the voter or admin role in the
    /// proposal's group plus nonzero treasury voting power.
    pub async fn vote(&self, voter: Principal, id: ProposalId, choice: VoteChoice) -> Result<()> {
        let now = Utc::now().timestamp();

        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;

        if proposal.status != Status::Voting {
            return Err(GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: proposal.effective_status(now).to_string(),
            });
        }
        self.registry
            .authorize(
                proposal.group_id,
                &voter,
                &[Role::Voter, Role::Admin],
                "vote on proposals",
            )
            .await?;

        let power = self.credit.power_of(&voter).await?;
        TallyEngine::cast(&mut proposal.voting, voter, choice, power, now)?;
        proposal.updated_at = now;

        let ballot = match choice {
            VoteChoice::Approve => "approve",
            VoteChoice::Reject => "reject",
        };
        metrics::VOTES_CAST.with_label_values(&[ballot]).inc();
        info!(
            proposal_id = %id,
            voter = %voter,
            ballot = ballot,
            power = %power,
            "🗳️ Vote cast"
        );
        Ok(())
    }

    /// Close an ended voting window and decide the proposal. Proposer or
    /// group admin only. The deciding rule id is recorded on the proposal.
    pub async fn finalize(&self, caller: Principal, id: ProposalId) -> Result<Status> {
        let now = Utc::now().timestamp();

        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;

        if caller != proposal.proposer {
            self.registry
                .authorize(
                    proposal.group_id,
                    &caller,
                    &[Role::Admin],
                    "finalize proposals",
                )
                .await?;
        }
        if proposal.status != Status::Voting {
            return Err(GovernanceError::InvalidStatus {
                expected: "voting".to_string(),
                found: proposal.effective_status(now).to_string(),
            });
        }
        if !proposal.voting.has_ended(now) {
            return Err(GovernanceError::VotingNotEnded);
        }

        let (rule, decided_by) = self.resolve_rule(proposal).await?;
        let outcome = TallyEngine::evaluate(&proposal.voting, &rule);

        let decided = if outcome.passed() {
            proposal.approved_at = Some(now);
            proposal.claimable_at = Some(now + rule.timelock_secs.unwrap_or(0));
            Status::Approved
        } else {
            Status::Rejected
        };
        proposal.decided_by_rule = decided_by;
        proposal.status = decided;
        proposal.updated_at = now;

        metrics::VOTING_FINALIZED
            .with_label_values(&[outcome.label()])
            .inc();
        info!(
            proposal_id = %id,
            result = %decided,
            decided_by_rule = ?decided_by,
            approval = %proposal.voting.approval_power,
            total = %proposal.voting.total_power,
            "📊 Proposal voting finalized"
        );
        Ok(decided)
    }

    /// Issue the disbursement authorization for an approved proposal.
    /// Proposer or group admin only; repeated calls return the original
    /// record.
    pub async fn generate_authorization(
        &self,
        caller: Principal,
        id: ProposalId,
    ) -> Result<Authorization> {
        let now = Utc::now().timestamp();

        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;

        if caller != proposal.proposer {
            self.registry
                .authorize(
                    proposal.group_id,
                    &caller,
                    &[Role::Admin],
                    "generate authorizations",
                )
                .await?;
        }

        let target = AuthorizationTarget::Proposal(id);
        match proposal.status {
            Status::Claimed => {
                self.authorizations.existing(&target).await.ok_or_else(|| {
                    GovernanceError::InvalidStatus {
                        expected: "approved".to_string(),
                        found: "claimed without authorization record".to_string(),
                    }
                })
            }
            Status::Approved => {
                if let Some(claimable_at) = proposal.claimable_at {
                    if now < claimable_at {
                        return Err(GovernanceError::TimelockActive { claimable_at });
                    }
                }

                let authorization = self
                    .authorizations
                    .issue(
                        target,
                        proposal.payee,
                        proposal.amount,
                        None,
                        Some(proposal.asset_id),
                    )
                    .await?;

                proposal.status = Status::Claimed;
                proposal.updated_at = now;
                info!(
                    proposal_id = %id,
                    authorization_id = %authorization.id,
                    payee = %proposal.payee,
                    amount = %proposal.amount,
                    "💸 Proposal authorization issued"
                );
                Ok(authorization)
            }
            _ => Err(GovernanceError::InvalidStatus {
                expected: "approved".to_string(),
                found: proposal.effective_status(now).to_string(),
            }),
        }
    }

    pub async fn get_proposal(&self, id: ProposalId) -> Option<Proposal> {
        let proposals = self.proposals.read().await;
        proposals.get(&id).cloned()
    }

    /// Proposals with id >= `from`, in id order, at most `limit` entries.
    pub async fn proposals_from(&self, from: u64, limit: usize) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut page: Vec<Proposal> = proposals
            .values()
            .filter(|p| p.id.value() >= from)
            .cloned()
            .collect();
        page.sort_by_key(|p| p.id);
        page.truncate(limit);
        page
    }

    pub async fn proposals_of_group(&self, group_id: fisc_types::GroupId) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut own: Vec<Proposal> = proposals
            .values()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect();
        own.sort_by_key(|p| p.id);
        own
    }

    pub async fn proposals_for_asset(&self, asset_id: fisc_types::AssetId) -> Vec<Proposal> {
        let proposals = self.proposals.read().await;
        let mut own: Vec<Proposal> = proposals
            .values()
            .filter(|p| p.asset_id == asset_id)
            .cloned()
            .collect();
        own.sort_by_key(|p| p.id);
        own
    }

    pub async fn proposal_count(&self) -> usize {
        let proposals = self.proposals.read().await;
        proposals.len()
    }

    /// Resolve the rule this proposal is judged by, most specific first:
    /// the requested rule version, the registry's effective rule, then the
    /// system default. Returns the rule id recorded as the decider, `None`
    /// when the system default applied.
    async fn resolve_rule(&self, proposal: &Proposal) -> Result<(RuleSpec, Option<RuleId>)> {
        if let Some(rule_id) = proposal.requested_rule {
            let rule = self
                .registry
                .get_rule(rule_id)
                .await
                .ok_or_else(|| GovernanceError::RuleNotFound(rule_id.to_string()))?;
            return Ok((rule.spec, Some(rule.id)));
        }
        if let Some(rule) = self
            .registry
            .effective_rule(proposal.group_id, proposal.asset_id)
            .await
        {
            return Ok((rule.spec, Some(rule.id)));
        }
        Ok((self.config.default_rule, None))
    }

    /// Test helper: retro-date a proposal's voting window end.
    #[doc(hidden)]
    pub async fn test_set_voting_end(&self, id: ProposalId, end_time: i64) -> Result<()> {
        let mut proposals = self.proposals.write().await;
        let proposal = proposals
            .get_mut(&id)
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        proposal.voting.end_time = end_time;
        Ok(())
    }
}
