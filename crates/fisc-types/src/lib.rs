/*!
# Fisc Types

Core shared types for the fisc treasury and governance engine.

## Features

- **Principals**: 32-byte caller identities with hex encoding
- **Amounts**: overflow-checked token and voting-power arithmetic (u128)
- **Currencies**: the accepted donation currencies and their precision
- **Identifiers**: monotonic per-entity-family id generation
- **Lifecycle**: the status-machine trait shared by grants and proposals
*/

pub mod amount;
pub mod currency;
pub mod ids;
pub mod lifecycle;
pub mod principal;
pub mod sequence;

pub use amount::{TokenAmount, VotePower};
pub use currency::{Currency, UnknownCurrency};
pub use ids::{AssetId, AuthorizationId, GrantId, GroupId, ProposalId, RuleId};
pub use lifecycle::LifecycleState;
pub use principal::Principal;
pub use sequence::Sequence;
