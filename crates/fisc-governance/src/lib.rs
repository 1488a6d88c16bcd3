/*!
# Fisc Governance

Treasury governance for the fisc engine implementing:
- Grant lifecycle state machine (submitted → review → voting → decision → claim)
- Donation-weighted voting with one vote per (voter, subject) and cast-time
  power snapshots
- Group disbursement proposals against registered assets
- Append-only, versioned quorum/threshold/timelock rules with asset-specific
  precedence over group defaults
- Idempotent disbursement authorizations derived from their target
- Read-only audit projections with stable id-based pagination

## Design Notes

- **Lazy time**: nothing runs on a timer. A voting window's passage is
  detected on the next call that cares; an unfinalized window past its end
  reads as `expired`, and finalization is the only stored transition out.
- **Pass rule**: a tally passes iff the cast power meets the quorum and the
  approval share of cast power meets the threshold percentage, both
  inclusive.
- **No double-pay**: authorization issuance is keyed by target; re-claiming
  returns the original record instead of issuing again.

## Module Structure

- **types**: Core data structures (Grant, Proposal, Group, Rule, etc.)
- **lifecycle**: Grant state machine and claim path
- **voting**: Weighted tally engine shared by grants and proposals
- **registry**: Groups, members, assets, and the rule history
- **proposals**: Group proposal management
- **authorization**: Disbursement authorization issuance and the ledger seam
- **audit**: Side-effect-free audit projections
- **error**: Governance-specific errors

## Example Usage

```rust
use fisc_governance::{GovernanceRegistry, Role};
use fisc_types::Principal;

# #[tokio::main]
# async fn main() {
let registry = GovernanceRegistry::new();
let founder = Principal::from_bytes([1; 32]);

let group = registry
    .create_group(founder, "ops".to_string(), "Operations".to_string())
    .await
    .unwrap();

// The founder holds every role.
let member = registry.member(group, &founder).await.unwrap();
assert!(member.roles.contains(&Role::Admin));
# }
```
*/

pub mod audit;
pub mod authorization;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod proposals;
pub mod registry;
pub mod types;
pub mod voting;

pub use audit::{
    AssetAudit, AuditQueries, GroupAudit, MemberAudit, MemberSummary, ProposalAudit, SystemAudit,
};
pub use authorization::{
    AssetLedger, AuthorizationManager, NullAssetLedger, RecordingAssetLedger, DST_AUTHORIZATION,
};
pub use error::{GovernanceError, Result};
pub use lifecycle::{GrantLifecycle, LifecycleConfig, GRANT_PAGE_SIZE};
pub use proposals::ProposalManager;
pub use registry::GovernanceRegistry;
pub use types::{
    Asset, AssetKind, Authorization, AuthorizationTarget, Grant, Group, Member, NewAsset,
    NewGrant, NewProposal, Proposal, Role, Rule, RuleSpec, Status, Vote, VoteChoice, VotingStatus,
};
pub use voting::{TallyEngine, TallyOutcome};
