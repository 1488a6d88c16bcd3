use anyhow::Result;
use async_trait::async_trait;
use fisc_types::Principal;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Domain separator for principal derivation from identity tokens.
pub const DST_IDENTITY: &[u8] = b"FISC-ID-v1";

/// Resolves opaque caller tokens to principals.
///
/// Every mutating engine call goes through this seam, so a deployment can
/// plug in its real authentication backend. Resolution is expected to be
/// fast and local; an unavailable backend should fail the call, not block.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Principal>;
}

/// In-memory identity registry.
///
/// Unknown tokens get a stable principal derived from the token bytes, so
/// the same caller always resolves to the same identity. Explicit bindings
/// registered up front take precedence over derivation.
pub struct MemoryIdentityRegistry {
    bindings: RwLock<HashMap<String, Principal>>,
}

impl Default for MemoryIdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityRegistry {
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a token to a known principal, overriding any derived identity.
    pub async fn register(&self, token: &str, principal: Principal) {
        let mut bindings = self.bindings.write().await;
        bindings.insert(token.to_string(), principal);
    }
}

#[async_trait]
impl IdentityRegistry for MemoryIdentityRegistry {
    async fn resolve(&self, token: &str) -> Result<Principal> {
        if token.trim().is_empty() {
            anyhow::bail!("identity token must not be empty");
        }

        {
            let bindings = self.bindings.read().await;
            if let Some(principal) = bindings.get(token) {
                return Ok(*principal);
            }
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(DST_IDENTITY);
        hasher.update(token.as_bytes());
        let principal = Principal::from_bytes(*hasher.finalize().as_bytes());

        let mut bindings = self.bindings.write().await;
        bindings.insert(token.to_string(), principal);
        debug!(principal = %principal, "Identity derived from token");
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolution_is_stable() {
        let registry = MemoryIdentityRegistry::new();
        let first = registry.resolve("alice").await.unwrap();
        let again = registry.resolve("alice").await.unwrap();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_distinct_tokens_get_distinct_principals() {
        let registry = MemoryIdentityRegistry::new();
        let alice = registry.resolve("alice").await.unwrap();
        let bob = registry.resolve("bob").await.unwrap();
        assert_ne!(alice, bob);
    }

    #[tokio::test]
    async fn test_registered_binding_wins() {
        let registry = MemoryIdentityRegistry::new();
        let pinned = Principal::from_bytes([7; 32]);
        registry.register("alice", pinned).await;
        assert_eq!(registry.resolve("alice").await.unwrap(), pinned);
    }

    #[tokio::test]
    async fn test_empty_token_refused() {
        let registry = MemoryIdentityRegistry::new();
        assert!(registry.resolve("").await.is_err());
        assert!(registry.resolve("   ").await.is_err());
    }
}
