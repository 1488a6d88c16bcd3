use crate::authorization::AuthorizationManager;
use crate::lifecycle::GrantLifecycle;
use crate::proposals::ProposalManager;
use crate::registry::GovernanceRegistry;
use crate::types::{
    Asset, Authorization, AuthorizationTarget, Proposal, Role, Rule, Status, Vote,
};
use crate::{GovernanceError, Result};
use chrono::Utc;
use fisc_ledger::CreditLedger;
use fisc_types::{AssetId, GroupId, Principal, ProposalId, RuleId, TokenAmount, VotePower};
use serde::Serialize;
use std::sync::Arc;

/// Full audit record for one proposal, including its vote log and any
/// issued authorization.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalAudit {
    pub id: ProposalId,
    pub group_id: GroupId,
    pub asset_id: AssetId,
    pub proposer: Principal,
    pub payee: Principal,
    pub amount: TokenAmount,
    pub purpose: String,
    pub evidence_hash: Option<String>,
    pub requested_rule: Option<RuleId>,
    pub decided_by_rule: Option<RuleId>,
    /// Status as observed at query time.
    pub status: Status,
    pub created_at: i64,
    pub updated_at: i64,
    pub approved_at: Option<i64>,
    pub claimable_at: Option<i64>,
    pub votes: Vec<Vote>,
    pub approval_power: VotePower,
    pub reject_power: VotePower,
    pub total_power: VotePower,
    pub authorization: Option<Authorization>,
}

/// Audit record for a registered asset and the proposals raised against it.
#[derive(Debug, Clone, Serialize)]
pub struct AssetAudit {
    pub asset: Asset,
    /// Rule currently governing this asset, if any is registered.
    pub effective_rule: Option<Rule>,
    /// Asset-scoped rule versions, oldest first.
    pub rule_history: Vec<Rule>,
    pub proposal_ids: Vec<ProposalId>,
    pub total_requested: TokenAmount,
    pub disbursements_authorized: usize,
}

/// Audit record for one group membership.
#[derive(Debug, Clone, Serialize)]
pub struct MemberAudit {
    pub group_id: GroupId,
    pub principal: Principal,
    pub roles: Vec<Role>,
    pub joined_at: i64,
    pub voting_power: VotePower,
    pub proposals_raised: usize,
    pub votes_cast: usize,
}

/// One membership row in a group audit.
#[derive(Debug, Clone, Serialize)]
pub struct MemberSummary {
    pub principal: Principal,
    pub roles: Vec<Role>,
    pub joined_at: i64,
}

/// Audit record for a group and its governance surface.
#[derive(Debug, Clone, Serialize)]
pub struct GroupAudit {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub members: Vec<MemberSummary>,
    pub assets: Vec<Asset>,
    /// Full rule history of the group, in append order.
    pub rules: Vec<Rule>,
    pub proposal_count: usize,
}

/// System-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct SystemAudit {
    pub groups: usize,
    pub members: usize,
    pub assets: usize,
    pub rules: usize,
    /// Latest rule id; advances with every appended version.
    pub rules_version: u64,
    pub proposals: usize,
    pub grants: usize,
    pub donations: usize,
    pub total_voting_power: VotePower,
    pub authorizations_issued: usize,
}

/// Read-only audit projections over the engine's histories.
///
/// Every query is side-effect free and runs against the latest committed
/// state; none of them takes a write lock.
pub struct AuditQueries {
    grants: Arc<GrantLifecycle>,
    proposals: Arc<ProposalManager>,
    registry: Arc<GovernanceRegistry>,
    credit: Arc<CreditLedger>,
    authorizations: Arc<AuthorizationManager>,
}

impl AuditQueries {
    pub fn new(
        grants: Arc<GrantLifecycle>,
        proposals: Arc<ProposalManager>,
        registry: Arc<GovernanceRegistry>,
        credit: Arc<CreditLedger>,
        authorizations: Arc<AuthorizationManager>,
    ) -> Self {
        Self {
            grants,
            proposals,
            registry,
            credit,
            authorizations,
        }
    }

    pub async fn audit_proposal(&self, id: ProposalId) -> Result<ProposalAudit> {
        let proposal = self
            .proposals
            .get_proposal(id)
            .await
            .ok_or(GovernanceError::ProposalNotFound(id))?;
        Ok(self.project_proposal(proposal).await)
    }

    /// Proposal audits with id >= `from`, in id order, at most `limit`
    /// entries. Stable under concurrent writes: rows are keyed by the
    /// monotonic proposal id, never by list position.
    pub async fn list_proposals_audit(&self, from: u64, limit: usize) -> Vec<ProposalAudit> {
        let page = self.proposals.proposals_from(from, limit).await;
        let mut audits = Vec::with_capacity(page.len());
        for proposal in page {
            audits.push(self.project_proposal(proposal).await);
        }
        audits
    }

    pub async fn audit_asset(&self, id: AssetId) -> Result<AssetAudit> {
        let asset = self
            .registry
            .get_asset(id)
            .await
            .ok_or(GovernanceError::AssetNotFound(id))?;

        let effective_rule = self.registry.effective_rule(asset.group_id, id).await;
        let rule_history = self.registry.rules_for_asset(id).await;
        let raised = self.proposals.proposals_for_asset(id).await;

        let mut total_requested = TokenAmount::ZERO;
        let mut authorized = 0;
        let mut proposal_ids = Vec::with_capacity(raised.len());
        for proposal in &raised {
            total_requested = total_requested.saturating_add(proposal.amount);
            if proposal.status == Status::Claimed {
                authorized += 1;
            }
            proposal_ids.push(proposal.id);
        }

        Ok(AssetAudit {
            asset,
            effective_rule,
            rule_history,
            proposal_ids,
            total_requested,
            disbursements_authorized: authorized,
        })
    }

    pub async fn audit_member(&self, group_id: GroupId, principal: Principal) -> Result<MemberAudit> {
        let member = self.registry.member(group_id, &principal).await?;
        let voting_power = self.credit.power_of(&principal).await?;

        let group_proposals = self.proposals.proposals_of_group(group_id).await;
        let proposals_raised = group_proposals
            .iter()
            .filter(|p| p.proposer == principal)
            .count();
        let votes_cast = group_proposals
            .iter()
            .filter(|p| p.voting.has_voted(&principal))
            .count();

        let mut roles: Vec<Role> = member.roles.into_iter().collect();
        roles.sort();

        Ok(MemberAudit {
            group_id,
            principal,
            roles,
            joined_at: member.joined_at,
            voting_power,
            proposals_raised,
            votes_cast,
        })
    }

    pub async fn audit_group_info(&self, id: GroupId) -> Result<GroupAudit> {
        let group = self
            .registry
            .get_group(id)
            .await
            .ok_or(GovernanceError::GroupNotFound(id))?;

        let mut members: Vec<MemberSummary> = group
            .members
            .values()
            .map(|m| {
                let mut roles: Vec<Role> = m.roles.iter().copied().collect();
                roles.sort();
                MemberSummary {
                    principal: m.principal,
                    roles,
                    joined_at: m.joined_at,
                }
            })
            .collect();
        members.sort_by_key(|m| (m.joined_at, m.principal));

        Ok(GroupAudit {
            id: group.id,
            name: group.name,
            description: group.description,
            created_at: group.created_at,
            members,
            assets: self.registry.assets_of_group(id).await,
            rules: self.registry.rules_of_group(id).await,
            proposal_count: self.proposals.proposals_of_group(id).await.len(),
        })
    }

    pub async fn audit_system_info(&self) -> Result<SystemAudit> {
        Ok(SystemAudit {
            groups: self.registry.group_count().await,
            members: self.registry.member_count().await,
            assets: self.registry.asset_count().await,
            rules: self.registry.rule_count().await,
            rules_version: self.registry.rules_version().await,
            proposals: self.proposals.proposal_count().await,
            grants: self.grants.grant_count().await,
            donations: self.credit.donation_count().await?,
            total_voting_power: self.credit.total_power().await,
            authorizations_issued: self.authorizations.issued_count().await,
        })
    }

    async fn project_proposal(&self, proposal: Proposal) -> ProposalAudit {
        let now = Utc::now().timestamp();
        let status = proposal.effective_status(now);
        let authorization = self
            .authorizations
            .existing(&AuthorizationTarget::Proposal(proposal.id))
            .await;

        ProposalAudit {
            id: proposal.id,
            group_id: proposal.group_id,
            asset_id: proposal.asset_id,
            proposer: proposal.proposer,
            payee: proposal.payee,
            amount: proposal.amount,
            purpose: proposal.purpose,
            evidence_hash: proposal.evidence_hash,
            requested_rule: proposal.requested_rule,
            decided_by_rule: proposal.decided_by_rule,
            status,
            created_at: proposal.created_at,
            updated_at: proposal.updated_at,
            approved_at: proposal.approved_at,
            claimable_at: proposal.claimable_at,
            votes: proposal.voting.votes,
            approval_power: proposal.voting.approval_power,
            reject_power: proposal.voting.reject_power,
            total_power: proposal.voting.total_power,
            authorization,
        }
    }
}
