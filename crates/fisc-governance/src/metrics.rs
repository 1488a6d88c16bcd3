//! Prometheus metrics for the governance module
//!
//! Tracks grant and proposal lifecycles, voting, rule changes, and
//! disbursement authorizations.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

/// Grants not yet in a closed state
pub static ACTIVE_GRANTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "fisc_governance_active_grants",
        "Number of grants awaiting review, vote, or claim"
    )
    .unwrap()
});

/// Grant lifecycle transitions
pub static GRANT_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_governance_grant_transitions_total",
        "Total grant lifecycle transitions",
        &["from_status", "to_status"]
    )
    .unwrap()
});

/// Votes cast, by ballot
pub static VOTES_CAST: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_governance_votes_cast_total",
        "Total votes cast",
        &["ballot"]
    )
    .unwrap()
});

/// Voting finalizations, by tally outcome
pub static VOTING_FINALIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_governance_voting_finalized_total",
        "Total voting finalizations",
        &["result"]
    )
    .unwrap()
});

/// Group proposals created
pub static PROPOSALS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_proposals_created_total",
        "Total group proposals created"
    )
    .unwrap()
});

/// Governance groups created
pub static GROUPS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_groups_created_total",
        "Total governance groups created"
    )
    .unwrap()
});

/// Members added or re-added to groups
pub static MEMBERS_ADDED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_members_added_total",
        "Total group membership additions (role merges included)"
    )
    .unwrap()
});

/// Assets registered with groups
pub static ASSETS_REGISTERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_assets_registered_total",
        "Total assets registered"
    )
    .unwrap()
});

/// Rule versions appended
pub static RULES_SET: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_rules_set_total",
        "Total rule versions appended"
    )
    .unwrap()
});

/// Disbursement authorizations issued, by target kind
pub static AUTHORIZATIONS_ISSUED: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "fisc_governance_authorizations_issued_total",
        "Total disbursement authorizations issued",
        &["target"]
    )
    .unwrap()
});

/// Authorization issue calls answered with an existing record
pub static AUTHORIZATION_REPLAYS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "fisc_governance_authorization_replays_total",
        "Total authorization requests that returned an already-issued record"
    )
    .unwrap()
});
