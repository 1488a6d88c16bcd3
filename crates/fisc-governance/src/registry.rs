use crate::metrics;
use crate::types::{Asset, Group, Member, NewAsset, Role, Rule, RuleSpec};
use crate::{GovernanceError, Result};
use chrono::Utc;
use fisc_types::{AssetId, GroupId, Principal, RuleId, Sequence};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Registry of governance groups, their assets, and the append-only rule
/// history.
///
/// Rules are never edited in place: `set_rule` appends a new version, and
/// `effective_rule` resolves the most specific, most recent one. Current
/// rules are therefore always recomputable from the log.
pub struct GovernanceRegistry {
    groups: Arc<RwLock<HashMap<GroupId, Group>>>,
    assets: Arc<RwLock<HashMap<AssetId, Asset>>>,
    rules: Arc<RwLock<Vec<Rule>>>,
    group_sequence: Sequence,
    asset_sequence: Sequence,
    rule_sequence: Sequence,
}

impl Default for GovernanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceRegistry {
    pub fn new() -> Self {
        Self {
            groups: Arc::new(RwLock::new(HashMap::new())),
            assets: Arc::new(RwLock::new(HashMap::new())),
            rules: Arc::new(RwLock::new(Vec::new())),
            group_sequence: Sequence::new(1),
            asset_sequence: Sequence::new(1),
            rule_sequence: Sequence::new(1),
        }
    }

    /// Create a governance group. The founder becomes its first member and
    /// holds every role.
    pub async fn create_group(
        &self,
        founder: Principal,
        name: String,
        description: String,
    ) -> Result<GroupId> {
        if name.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "group name must not be empty".to_string(),
            ));
        }

        let now = Utc::now().timestamp();
        let id = GroupId::new(self.group_sequence.next());

        let mut members = HashMap::new();
        members.insert(
            founder,
            Member {
                principal: founder,
                roles: [Role::Admin, Role::Voter, Role::Proposer]
                    .into_iter()
                    .collect(),
                joined_at: now,
            },
        );

        let mut groups = self.groups.write().await;
        groups.insert(
            id,
            Group {
                id,
                name: name.clone(),
                description,
                members,
                created_at: now,
            },
        );

        metrics::GROUPS_CREATED.inc();
        info!(group_id = %id, founder = %founder, name = %name, "🏛️ Group created");
        Ok(id)
    }

    /// Add a member to a group, or merge roles into an existing membership.
    /// Group admin only.
    pub async fn add_member(
        &self,
        caller: Principal,
        group_id: GroupId,
        principal: Principal,
        roles: HashSet<Role>,
    ) -> Result<()> {
        if roles.is_empty() {
            return Err(GovernanceError::InvalidInput(
                "at least one role is required".to_string(),
            ));
        }

        let now = Utc::now().timestamp();
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(&group_id)
            .ok_or(GovernanceError::GroupNotFound(group_id))?;

        if !group.has_role(&caller, Role::Admin) {
            return Err(GovernanceError::Unauthorized(
                "only a group admin may add members".to_string(),
            ));
        }

        match group.members.get_mut(&principal) {
            Some(member) => {
                // Existing membership: union the roles, keep the join time.
                member.roles.extend(roles.iter().copied());
                debug!(
                    group_id = %group_id,
                    member = %principal,
                    roles = ?member.roles,
                    "Member roles merged"
                );
            }
            None => {
                group.members.insert(
                    principal,
                    Member {
                        principal,
                        roles: roles.clone(),
                        joined_at: now,
                    },
                );
                info!(
                    group_id = %group_id,
                    member = %principal,
                    roles = ?roles,
                    "👥 Member added"
                );
            }
        }

        metrics::MEMBERS_ADDED.inc();
        Ok(())
    }

    /// Register an asset under a group. Group admin only.
    pub async fn register_asset(
        &self,
        caller: Principal,
        group_id: GroupId,
        new_asset: NewAsset,
    ) -> Result<AssetId> {
        if new_asset.asset_type.trim().is_empty() {
            return Err(GovernanceError::InvalidInput(
                "asset type must not be empty".to_string(),
            ));
        }
        self.authorize(group_id, &caller, &[Role::Admin], "register assets")
            .await?;

        let now = Utc::now().timestamp();
        let id = AssetId::new(self.asset_sequence.next());

        let mut assets = self.assets.write().await;
        assets.insert(
            id,
            Asset {
                id,
                group_id,
                kind: new_asset.kind,
                asset_type: new_asset.asset_type.clone(),
                description: new_asset.description,
                canister_ref: new_asset.canister_ref,
                token_ref: new_asset.token_ref,
                constraints: new_asset.constraints,
                registered_at: now,
            },
        );

        metrics::ASSETS_REGISTERED.inc();
        info!(
            asset_id = %id,
            group_id = %group_id,
            kind = ?new_asset.kind,
            asset_type = %new_asset.asset_type,
            "🏦 Asset registered"
        );
        Ok(id)
    }

    /// Append a rule version scoped to a group, or to one of its assets.
    /// Group admin only.
    pub async fn set_rule(
        &self,
        caller: Principal,
        group_id: GroupId,
        asset_id: Option<AssetId>,
        spec: RuleSpec,
    ) -> Result<RuleId> {
        if spec.threshold == 0 || spec.threshold > 100 {
            return Err(GovernanceError::InvalidInput(format!(
                "threshold must be within (0, 100], got {}",
                spec.threshold
            )));
        }
        if let Some(timelock) = spec.timelock_secs {
            if timelock < 0 {
                return Err(GovernanceError::InvalidInput(
                    "timelock must not be negative".to_string(),
                ));
            }
        }
        self.authorize(group_id, &caller, &[Role::Admin], "set rules")
            .await?;

        if let Some(asset_id) = asset_id {
            let assets = self.assets.read().await;
            let asset = assets
                .get(&asset_id)
                .ok_or(GovernanceError::AssetNotFound(asset_id))?;
            if asset.group_id != group_id {
                return Err(GovernanceError::InvalidInput(format!(
                    "asset {} is not registered under group {}",
                    asset_id, group_id
                )));
            }
        }

        let now = Utc::now().timestamp();
        let id = RuleId::new(self.rule_sequence.next());

        let mut rules = self.rules.write().await;
        rules.push(Rule {
            id,
            group_id,
            asset_id,
            spec,
            created_at: now,
        });

        metrics::RULES_SET.inc();
        info!(
            rule_id = %id,
            group_id = %group_id,
            asset_id = ?asset_id,
            threshold = spec.threshold,
            quorum = %spec.quorum,
            timelock_secs = ?spec.timelock_secs,
            "📐 Rule set"
        );
        Ok(id)
    }

    /// Resolve the rule governing (group, asset): the latest asset-specific
    /// version wins over the latest group default. `None` means the caller
    /// falls back to the system default.
    pub async fn effective_rule(&self, group_id: GroupId, asset_id: AssetId) -> Option<Rule> {
        let rules = self.rules.read().await;

        let latest = |scoped: bool| {
            rules
                .iter()
                .filter(|r| {
                    r.group_id == group_id
                        && if scoped {
                            r.asset_id == Some(asset_id)
                        } else {
                            r.asset_id.is_none()
                        }
                })
                .max_by_key(|r| r.id)
                .cloned()
        };

        latest(true).or_else(|| latest(false))
    }

    /// Check the caller holds at least one of `any_of` in the group.
    pub async fn authorize(
        &self,
        group_id: GroupId,
        caller: &Principal,
        any_of: &[Role],
        action: &str,
    ) -> Result<()> {
        let groups = self.groups.read().await;
        let group = groups
            .get(&group_id)
            .ok_or(GovernanceError::GroupNotFound(group_id))?;

        let allowed = any_of.iter().any(|role| group.has_role(caller, *role));
        if allowed {
            Ok(())
        } else {
            Err(GovernanceError::Unauthorized(format!(
                "caller lacks a role required to {}",
                action
            )))
        }
    }

    pub async fn get_group(&self, id: GroupId) -> Option<Group> {
        let groups = self.groups.read().await;
        groups.get(&id).cloned()
    }

    pub async fn groups(&self) -> Vec<Group> {
        let groups = self.groups.read().await;
        let mut all: Vec<Group> = groups.values().cloned().collect();
        all.sort_by_key(|g| g.id);
        all
    }

    pub async fn member(&self, group_id: GroupId, principal: &Principal) -> Result<Member> {
        let groups = self.groups.read().await;
        let group = groups
            .get(&group_id)
            .ok_or(GovernanceError::GroupNotFound(group_id))?;
        group
            .members
            .get(principal)
            .cloned()
            .ok_or(GovernanceError::MemberNotFound {
                group: group_id,
                principal: *principal,
            })
    }

    pub async fn get_asset(&self, id: AssetId) -> Option<Asset> {
        let assets = self.assets.read().await;
        assets.get(&id).cloned()
    }

    pub async fn assets_of_group(&self, group_id: GroupId) -> Vec<Asset> {
        let assets = self.assets.read().await;
        let mut own: Vec<Asset> = assets
            .values()
            .filter(|a| a.group_id == group_id)
            .cloned()
            .collect();
        own.sort_by_key(|a| a.id);
        own
    }

    pub async fn get_rule(&self, id: RuleId) -> Option<Rule> {
        let rules = self.rules.read().await;
        rules.iter().find(|r| r.id == id).cloned()
    }

    /// Full rule history for a group, in append order.
    pub async fn rules_of_group(&self, group_id: GroupId) -> Vec<Rule> {
        let rules = self.rules.read().await;
        rules
            .iter()
            .filter(|r| r.group_id == group_id)
            .cloned()
            .collect()
    }

    /// Rule versions scoped to one asset, in append order.
    pub async fn rules_for_asset(&self, asset_id: AssetId) -> Vec<Rule> {
        let rules = self.rules.read().await;
        rules
            .iter()
            .filter(|r| r.asset_id == Some(asset_id))
            .cloned()
            .collect()
    }

    pub async fn group_count(&self) -> usize {
        let groups = self.groups.read().await;
        groups.len()
    }

    /// Membership rows across all groups.
    pub async fn member_count(&self) -> usize {
        let groups = self.groups.read().await;
        groups.values().map(|g| g.members.len()).sum()
    }

    pub async fn asset_count(&self) -> usize {
        let assets = self.assets.read().await;
        assets.len()
    }

    pub async fn rule_count(&self) -> usize {
        let rules = self.rules.read().await;
        rules.len()
    }

    /// Monotonic version of the rule history: the latest appended rule id,
    /// zero before any rule exists.
    pub async fn rules_version(&self) -> u64 {
        let rules = self.rules.read().await;
        rules.last().map(|r| r.id.value()).unwrap_or(0)
    }
}
