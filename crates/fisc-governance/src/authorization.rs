use crate::metrics;
use crate::types::{Authorization, AuthorizationTarget};
use crate::{GovernanceError, Result};
use async_trait::async_trait;
use chrono::Utc;
use fisc_types::{AssetId, AuthorizationId, Currency, Principal, TokenAmount};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Domain separation tag for authorization identifier derivation
pub const DST_AUTHORIZATION: &[u8] = b"FISC-AUTH-v1";

/// Downstream disbursement boundary. Invoked only when an authorization is
/// first issued, never from vote or tally logic. A failure here aborts the
/// issue with nothing recorded, so the caller can retry safely.
#[async_trait]
pub trait AssetLedger: Send + Sync {
    async fn authorize_transfer(&self, authorization: &Authorization) -> anyhow::Result<()>;
}

/// Adapter that accepts every transfer without forwarding it anywhere.
#[derive(Debug, Default)]
pub struct NullAssetLedger;

#[async_trait]
impl AssetLedger for NullAssetLedger {
    async fn authorize_transfer(&self, _authorization: &Authorization) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Adapter that records forwarded authorizations instead of executing them.
/// Useful in tests and dry runs.
#[derive(Default)]
pub struct RecordingAssetLedger {
    forwarded: RwLock<Vec<Authorization>>,
}

impl RecordingAssetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn forwarded(&self) -> Vec<Authorization> {
        self.forwarded.read().await.clone()
    }
}

#[async_trait]
impl AssetLedger for RecordingAssetLedger {
    async fn authorize_transfer(&self, authorization: &Authorization) -> anyhow::Result<()> {
        self.forwarded.write().await.push(authorization.clone());
        Ok(())
    }
}

/// Issues disbursement authorizations exactly once per target.
///
/// Identifiers are derived deterministically from the authorized fields, so
/// re-issuing for the same target returns a byte-identical record instead of
/// a duplicate payout instruction.
pub struct AuthorizationManager {
    adapter: Arc<dyn AssetLedger>,
    issued: Arc<RwLock<HashMap<AuthorizationTarget, Authorization>>>,
}

impl AuthorizationManager {
    pub fn new(adapter: Arc<dyn AssetLedger>) -> Self {
        Self {
            adapter,
            issued: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Derives the authorization identifier from the authorized fields.
    pub fn derive_id(
        target: AuthorizationTarget,
        recipient: &Principal,
        amount: TokenAmount,
        currency: Option<Currency>,
        asset_id: Option<AssetId>,
    ) -> AuthorizationId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DST_AUTHORIZATION);
        match target {
            AuthorizationTarget::Grant(id) => {
                hasher.update(b"grant");
                hasher.update(&id.value().to_le_bytes());
            }
            AuthorizationTarget::Proposal(id) => {
                hasher.update(b"proposal");
                hasher.update(&id.value().to_le_bytes());
            }
        }
        hasher.update(recipient.as_bytes());
        hasher.update(&amount.to_raw().to_le_bytes());
        if let Some(currency) = currency {
            hasher.update(currency.code().as_bytes());
        }
        if let Some(asset_id) = asset_id {
            hasher.update(&asset_id.value().to_le_bytes());
        }
        AuthorizationId::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Issues the authorization for `target`, or returns the previously
    /// issued record. The downstream adapter is consulted only on first
    /// issue; if it refuses, nothing is recorded.
    pub async fn issue(
        &self,
        target: AuthorizationTarget,
        recipient: Principal,
        amount: TokenAmount,
        currency: Option<Currency>,
        asset_id: Option<AssetId>,
    ) -> Result<Authorization> {
        let mut issued = self.issued.write().await;

        if let Some(existing) = issued.get(&target) {
            metrics::AUTHORIZATION_REPLAYS.inc();
            debug!(
                target = %target,
                authorization_id = %existing.id,
                "♻️ Authorization already issued, returning original"
            );
            return Ok(existing.clone());
        }

        let authorization = Authorization {
            id: Self::derive_id(target, &recipient, amount, currency, asset_id),
            target,
            recipient,
            amount,
            currency,
            asset_id,
            issued_at: Utc::now().timestamp(),
        };

        self.adapter
            .authorize_transfer(&authorization)
            .await
            .map_err(|e| GovernanceError::DisbursementFailed(e.to_string()))?;

        issued.insert(target, authorization.clone());

        let target_label = match target {
            AuthorizationTarget::Grant(_) => "grant",
            AuthorizationTarget::Proposal(_) => "proposal",
        };
        metrics::AUTHORIZATIONS_ISSUED
            .with_label_values(&[target_label])
            .inc();
        info!(
            target = %target,
            authorization_id = %authorization.id,
            recipient = %recipient,
            amount = %amount,
            "💸 Disbursement authorized"
        );

        Ok(authorization)
    }

    /// Previously issued authorization for `target`, if any.
    pub async fn existing(&self, target: &AuthorizationTarget) -> Option<Authorization> {
        let issued = self.issued.read().await;
        issued.get(target).cloned()
    }

    pub async fn issued_count(&self) -> usize {
        let issued = self.issued.read().await;
        issued.len()
    }

    pub async fn all(&self) -> Vec<Authorization> {
        let issued = self.issued.read().await;
        let mut all: Vec<Authorization> = issued.values().cloned().collect();
        all.sort_by_key(|a| a.issued_at);
        all
    }
}
