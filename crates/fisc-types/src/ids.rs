use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Monotonic grant identifier, assigned once and never reused.
    GrantId
);
entity_id!(
    /// Monotonic group-proposal identifier, assigned once and never reused.
    ProposalId
);
entity_id!(
    /// Governance group identifier.
    GroupId
);
entity_id!(
    /// Registered asset identifier.
    AssetId
);
entity_id!(
    /// Rule version identifier; doubles as the global rules version since
    /// rules are append-only.
    RuleId
);

/// Deterministically derived authorization identifier (blake3 over the
/// authorized disbursement fields).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorizationId([u8; 32]);

impl AuthorizationId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for AuthorizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthorizationId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_ordering() {
        assert!(GrantId::new(1) < GrantId::new(2));
        assert_eq!(ProposalId::new(5).value(), 5);
        assert_eq!(format!("{}", RuleId::new(3)), "3");
    }

    #[test]
    fn test_authorization_id_display() {
        let id = AuthorizationId::from_bytes([0xCD; 32]);
        assert!(id.to_hex().starts_with("cdcd"));
        assert_eq!(format!("{:?}", id), "AuthorizationId(cdcdcdcd...)");
    }
}
