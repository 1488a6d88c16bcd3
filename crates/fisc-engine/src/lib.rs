/*!
# Fisc Engine

Facade over the treasury-governance stack: the donation credit ledger,
grant lifecycle, group proposals, rule registry, authorization issuance,
and audit projections, behind a single caller-identity seam.

Every mutating call takes an opaque identity token, resolves it through
the [`IdentityRegistry`], and forwards the principal to the owning
manager. Read-only projections are anonymous.
*/

pub mod error;
pub mod identity;

pub use error::{EngineError, Result};
pub use identity::{IdentityRegistry, MemoryIdentityRegistry, DST_IDENTITY};

pub use fisc_governance::{
    Asset, AssetAudit, AssetKind, AssetLedger, AuditQueries, Authorization, AuthorizationManager,
    AuthorizationTarget, GovernanceError, GovernanceRegistry, Grant, GrantLifecycle, Group,
    GroupAudit, LifecycleConfig, Member, MemberAudit, NewAsset, NewGrant, NewProposal,
    NullAssetLedger, Proposal, ProposalAudit, ProposalManager, RecordingAssetLedger, Role, Rule,
    RuleSpec, Status, SystemAudit, Vote, VoteChoice, VotingStatus,
};
pub use fisc_ledger::{
    CreditLedger, Donation, ExchangeRate, IntegrityReport, LedgerError, LedgerStore, MemoryStore,
    PowerChange, PowerSource,
};
pub use fisc_types::{
    AssetId, AuthorizationId, Currency, GrantId, GroupId, Principal, ProposalId, RuleId,
    TokenAmount, VotePower,
};

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Engine configuration: lifecycle windows, the system default rule, and
/// the principals holding treasury-admin privileges.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub lifecycle: LifecycleConfig,
    pub admins: Vec<Principal>,
}

impl EngineConfig {
    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    pub fn with_admin(mut self, admin: Principal) -> Self {
        self.admins.push(admin);
        self
    }
}

/// A principal's voting power with its full change history.
#[derive(Debug, Clone, Serialize)]
pub struct VotingPowerView {
    pub principal: Principal,
    pub power: VotePower,
    pub changes: Vec<PowerChange>,
}

/// The treasury-governance engine.
///
/// Components are shared and public, so embedders can reach a manager
/// directly; the facade methods add caller resolution and the privileged
/// treasury-admin gate on top.
pub struct FiscEngine {
    pub identity: Arc<dyn IdentityRegistry>,
    pub credit: Arc<CreditLedger>,
    pub grants: Arc<GrantLifecycle>,
    pub registry: Arc<GovernanceRegistry>,
    pub proposals: Arc<ProposalManager>,
    pub authorizations: Arc<AuthorizationManager>,
    pub audit: AuditQueries,
    admins: Arc<RwLock<HashSet<Principal>>>,
}

impl FiscEngine {
    /// Build an engine on in-memory components: `MemoryStore`,
    /// `MemoryIdentityRegistry`, and the no-op asset ledger.
    pub async fn new(config: EngineConfig) -> Result<Self> {
        Self::with_components(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentityRegistry::new()),
            Arc::new(NullAssetLedger),
        )
        .await
    }

    /// Build an engine on caller-supplied storage, identity, and asset
    /// ledger implementations.
    pub async fn with_components(
        config: EngineConfig,
        store: Arc<dyn LedgerStore>,
        identity: Arc<dyn IdentityRegistry>,
        asset_ledger: Arc<dyn AssetLedger>,
    ) -> Result<Self> {
        let admin_count = config.admins.len();

        let credit = Arc::new(CreditLedger::new(store).await?);
        let authorizations = Arc::new(AuthorizationManager::new(asset_ledger));
        let admins: Arc<RwLock<HashSet<Principal>>> =
            Arc::new(RwLock::new(config.admins.into_iter().collect()));
        let grants = Arc::new(
            GrantLifecycle::new(
                config.lifecycle.clone(),
                credit.clone(),
                authorizations.clone(),
            )
            .with_admins(admins.clone()),
        );
        let registry = Arc::new(GovernanceRegistry::new());
        let proposals = Arc::new(ProposalManager::new(
            config.lifecycle,
            registry.clone(),
            credit.clone(),
            authorizations.clone(),
        ));
        let audit = AuditQueries::new(
            grants.clone(),
            proposals.clone(),
            registry.clone(),
            credit.clone(),
            authorizations.clone(),
        );

        info!(admins = admin_count, "🚀 Treasury governance engine started");

        Ok(Self {
            identity,
            credit,
            grants,
            registry,
            proposals,
            authorizations,
            audit,
            admins,
        })
    }

    // ---- Donations & voting power ----

    /// Credit a verified donation and return the voting power it granted.
    /// Replaying the same (currency, txRef) returns the original credit.
    pub async fn donate(
        &self,
        token: &str,
        currency: Currency,
        tx_ref: &str,
        amount: TokenAmount,
    ) -> Result<VotePower> {
        let donor = self.resolve(token).await?;
        let donation = self.credit.donate(donor, currency, tx_ref, amount).await?;
        Ok(donation.power)
    }

    /// Power credited for a transaction reference, if one was recorded.
    pub async fn get_donor_credit(&self, tx_ref: &str) -> Result<Option<VotePower>> {
        Ok(self.credit.donor_credit(tx_ref).await?.map(|d| d.power))
    }

    pub async fn get_my_donations(&self, token: &str) -> Result<Vec<Donation>> {
        let donor = self.resolve(token).await?;
        Ok(self.credit.donations_for(&donor).await?)
    }

    pub async fn get_exchange_rates(&self) -> Result<Vec<ExchangeRate>> {
        Ok(self.credit.exchange_rates().await?)
    }

    /// Set the conversion rate for a currency. Treasury admin only; applies
    /// to subsequent donations, never to past credits.
    pub async fn update_exchange_rates(
        &self,
        token: &str,
        currency: Currency,
        rate: u128,
    ) -> Result<ExchangeRate> {
        let caller = self.resolve(token).await?;
        self.require_admin(&caller, "update exchange rates").await?;
        Ok(self.credit.update_exchange_rate(currency, rate).await?)
    }

    /// Apply a signed power adjustment with an audit memo. Treasury admin
    /// only.
    pub async fn adjust_power(
        &self,
        token: &str,
        account: Principal,
        delta: i128,
        memo: &str,
    ) -> Result<VotePower> {
        let caller = self.resolve(token).await?;
        self.require_admin(&caller, "adjust voting power").await?;
        Ok(self.credit.adjust_power(account, delta, memo).await?)
    }

    /// A principal's power with its change history; `None` for accounts
    /// that never held power.
    pub async fn get_voting_power(&self, account: &Principal) -> Result<Option<VotingPowerView>> {
        let changes = self.credit.power_history(account).await?;
        if changes.is_empty() {
            return Ok(None);
        }
        let power = self.credit.power_of(account).await?;
        Ok(Some(VotingPowerView {
            principal: *account,
            power,
            changes,
        }))
    }

    pub async fn get_total_voting_power(&self) -> VotePower {
        self.credit.total_power().await
    }

    /// Recompute every cached power projection from the append-only
    /// histories and fail on any drift.
    pub async fn check_integrity(&self) -> Result<IntegrityReport> {
        Ok(self.credit.verify_integrity().await?)
    }

    // ---- Grants ----

    pub async fn apply_grant(&self, token: &str, new_grant: NewGrant) -> Result<GrantId> {
        let applicant = self.resolve(token).await?;
        Ok(self.grants.apply_grant(applicant, new_grant).await?)
    }

    pub async fn start_review(&self, token: &str, id: GrantId) -> Result<()> {
        let caller = self.resolve(token).await?;
        Ok(self.grants.start_review(caller, id).await?)
    }

    pub async fn start_grant_voting(&self, token: &str, id: GrantId) -> Result<()> {
        let caller = self.resolve(token).await?;
        Ok(self.grants.start_voting(caller, id).await?)
    }

    pub async fn finalize_grant_voting(&self, token: &str, id: GrantId) -> Result<Status> {
        let caller = self.resolve(token).await?;
        Ok(self.grants.finalize_voting(caller, id).await?)
    }

    pub async fn cancel_grant(&self, token: &str, id: GrantId) -> Result<()> {
        let caller = self.resolve(token).await?;
        Ok(self.grants.cancel_grant(caller, id).await?)
    }

    pub async fn reject_grant(&self, token: &str, id: GrantId) -> Result<()> {
        let caller = self.resolve(token).await?;
        Ok(self.grants.reject_grant(caller, id).await?)
    }

    pub async fn vote_on_grant(&self, token: &str, id: GrantId, choice: VoteChoice) -> Result<()> {
        let voter = self.resolve(token).await?;
        Ok(self.grants.vote(voter, id, choice).await?)
    }

    /// Claim an approved grant, returning the id of the disbursement
    /// authorization. Repeated claims return the same id.
    pub async fn claim_grant(&self, token: &str, id: GrantId) -> Result<AuthorizationId> {
        let caller = self.resolve(token).await?;
        let authorization = self.grants.claim_grant(caller, id).await?;
        Ok(authorization.id)
    }

    pub async fn get_grant(&self, id: GrantId) -> Option<Grant> {
        self.grants.get_grant(id).await
    }

    /// One page of grants filtered by read-time status (empty set = all).
    pub async fn get_grants(&self, statuses: &HashSet<Status>, offset: usize) -> Vec<Grant> {
        self.grants.grants_page(statuses, offset).await
    }

    pub async fn get_my_grants(&self, token: &str) -> Result<Vec<Grant>> {
        let applicant = self.resolve(token).await?;
        Ok(self.grants.grants_of(&applicant).await)
    }

    pub async fn get_all_grants(&self) -> Vec<Grant> {
        self.grants.all_grants().await
    }

    pub async fn get_grant_voting_status(&self, id: GrantId) -> Option<VotingStatus> {
        self.grants.voting_status(id).await
    }

    // ---- Groups, assets, rules, proposals ----

    pub async fn create_group(
        &self,
        token: &str,
        name: String,
        description: String,
    ) -> Result<GroupId> {
        let founder = self.resolve(token).await?;
        Ok(self.registry.create_group(founder, name, description).await?)
    }

    pub async fn add_member(
        &self,
        token: &str,
        group_id: GroupId,
        principal: Principal,
        roles: HashSet<Role>,
    ) -> Result<()> {
        let caller = self.resolve(token).await?;
        Ok(self
            .registry
            .add_member(caller, group_id, principal, roles)
            .await?)
    }

    pub async fn register_asset(
        &self,
        token: &str,
        group_id: GroupId,
        new_asset: NewAsset,
    ) -> Result<AssetId> {
        let caller = self.resolve(token).await?;
        Ok(self.registry.register_asset(caller, group_id, new_asset).await?)
    }

    pub async fn set_rule(
        &self,
        token: &str,
        group_id: GroupId,
        asset_id: Option<AssetId>,
        spec: RuleSpec,
    ) -> Result<RuleId> {
        let caller = self.resolve(token).await?;
        Ok(self.registry.set_rule(caller, group_id, asset_id, spec).await?)
    }

    pub async fn create_proposal(&self, token: &str, new: NewProposal) -> Result<ProposalId> {
        let proposer = self.resolve(token).await?;
        Ok(self.proposals.create(proposer, new).await?)
    }

    pub async fn vote_on_proposal(
        &self,
        token: &str,
        id: ProposalId,
        choice: VoteChoice,
    ) -> Result<()> {
        let voter = self.resolve(token).await?;
        Ok(self.proposals.vote(voter, id, choice).await?)
    }

    pub async fn finalize_proposal(&self, token: &str, id: ProposalId) -> Result<Status> {
        let caller = self.resolve(token).await?;
        Ok(self.proposals.finalize(caller, id).await?)
    }

    /// Issue (or re-fetch) the disbursement authorization for an approved
    /// proposal.
    pub async fn generate_authorization(
        &self,
        token: &str,
        id: ProposalId,
    ) -> Result<Authorization> {
        let caller = self.resolve(token).await?;
        Ok(self.proposals.generate_authorization(caller, id).await?)
    }

    pub async fn get_proposal(&self, id: ProposalId) -> Option<Proposal> {
        self.proposals.get_proposal(id).await
    }

    // ---- Audit projections ----

    pub async fn audit_proposal(&self, id: ProposalId) -> Result<ProposalAudit> {
        Ok(self.audit.audit_proposal(id).await?)
    }

    pub async fn list_proposals_audit(&self, from: u64, limit: usize) -> Vec<ProposalAudit> {
        self.audit.list_proposals_audit(from, limit).await
    }

    pub async fn audit_asset(&self, id: AssetId) -> Result<AssetAudit> {
        Ok(self.audit.audit_asset(id).await?)
    }

    pub async fn audit_member(
        &self,
        group_id: GroupId,
        principal: Principal,
    ) -> Result<MemberAudit> {
        Ok(self.audit.audit_member(group_id, principal).await?)
    }

    pub async fn audit_group_info(&self, id: GroupId) -> Result<GroupAudit> {
        Ok(self.audit.audit_group_info(id).await?)
    }

    pub async fn audit_system_info(&self) -> Result<SystemAudit> {
        Ok(self.audit.audit_system_info().await?)
    }

    // ---- Treasury admins ----

    /// Grant treasury-admin privileges. Treasury admin only.
    pub async fn add_admin(&self, token: &str, principal: Principal) -> Result<()> {
        let caller = self.resolve(token).await?;
        self.require_admin(&caller, "appoint admins").await?;
        let mut admins = self.admins.write().await;
        if admins.insert(principal) {
            info!(admin = %principal, "🔑 Treasury admin appointed");
        }
        Ok(())
    }

    pub async fn admins(&self) -> Vec<Principal> {
        let admins = self.admins.read().await;
        let mut all: Vec<Principal> = admins.iter().copied().collect();
        all.sort();
        all
    }

    async fn resolve(&self, token: &str) -> Result<Principal> {
        self.identity
            .resolve(token)
            .await
            .map_err(|e| EngineError::Identity(e.to_string()))
    }

    async fn require_admin(&self, caller: &Principal, action: &str) -> Result<()> {
        let admins = self.admins.read().await;
        if admins.contains(caller) {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized(format!(
                "only a treasury admin may {}",
                action
            ))
            .into())
        }
    }
}
