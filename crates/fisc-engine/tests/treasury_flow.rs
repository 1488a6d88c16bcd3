use chrono::Utc;
use fisc_engine::{
    Currency, EngineConfig, EngineError, FiscEngine, GovernanceError, LedgerError,
    LifecycleConfig, MemoryIdentityRegistry, MemoryStore, NewGrant, NullAssetLedger, Principal,
    RuleSpec, Status, TokenAmount, VoteChoice, VotePower,
};
use std::collections::HashSet;
use std::sync::Arc;

const ADMIN: &str = "treasury-admin";

async fn test_engine() -> FiscEngine {
    let identity = Arc::new(MemoryIdentityRegistry::new());
    let admin = Principal::from_bytes([0xAD; 32]);
    identity.register(ADMIN, admin).await;

    let lifecycle = LifecycleConfig::default()
        .with_grant_voting_period(60)
        .with_proposal_voting_period(60)
        .with_default_rule(RuleSpec {
            threshold: 60,
            quorum: VotePower::from_raw(100),
            timelock_secs: None,
        });

    FiscEngine::with_components(
        EngineConfig::default()
            .with_lifecycle(lifecycle)
            .with_admin(admin),
        Arc::new(MemoryStore::new()),
        identity,
        Arc::new(NullAssetLedger),
    )
    .await
    .unwrap()
}

fn node_grant(recipient: Principal) -> NewGrant {
    NewGrant {
        title: "Community node program".to_string(),
        description: "Run public infrastructure for a year".to_string(),
        category: "infrastructure".to_string(),
        proofs: vec!["https://example.org/plan".to_string()],
        amount: TokenAmount::from_raw(5_000),
        currency: Currency::Icp,
        recipient,
    }
}

async fn close_grant_voting(engine: &FiscEngine, id: fisc_engine::GrantId) {
    let now = Utc::now().timestamp();
    engine.grants.test_set_voting_end(id, now - 1).await.unwrap();
}

#[tokio::test]
async fn test_complete_treasury_lifecycle() {
    let engine = test_engine().await;

    // 1. Exchange rates gate donations
    println!("\n=== Testing Exchange Rates ===");

    let refused = engine
        .donate("alice", Currency::Icp, "tx-100", TokenAmount::from_raw(100))
        .await;
    assert!(matches!(
        refused,
        Err(EngineError::Ledger(LedgerError::RateUnavailable(Currency::Icp)))
    ));

    engine
        .update_exchange_rates(ADMIN, Currency::Icp, 1)
        .await
        .unwrap();
    engine
        .update_exchange_rates(ADMIN, Currency::CkUsdc, 50)
        .await
        .unwrap();
    let rates = engine.get_exchange_rates().await.unwrap();
    assert_eq!(rates.len(), 2);
    println!("Registered rates: {}", rates.len());

    // 2. Donations credit power; replays return the original credit
    println!("\n=== Testing Donations ===");

    let credited = engine
        .donate("alice", Currency::Icp, "tx-100", TokenAmount::from_raw(100))
        .await
        .unwrap();
    assert_eq!(credited, VotePower::from_raw(100));

    let replayed = engine
        .donate("alice", Currency::Icp, "tx-100", TokenAmount::from_raw(100))
        .await
        .unwrap();
    assert_eq!(replayed, VotePower::from_raw(100));
    assert_eq!(
        engine.get_donor_credit("tx-100").await.unwrap(),
        Some(VotePower::from_raw(100))
    );

    // A rate change affects new donations only; the replay above stays at
    // the credit recorded when it was first seen.
    engine
        .update_exchange_rates(ADMIN, Currency::Icp, 3)
        .await
        .unwrap();
    let replayed_after_raise = engine
        .donate("alice", Currency::Icp, "tx-100", TokenAmount::from_raw(100))
        .await
        .unwrap();
    assert_eq!(replayed_after_raise, VotePower::from_raw(100));

    // 900 tokens at 3 tokens per power unit
    let fresh = engine
        .donate("alice", Currency::Icp, "tx-101", TokenAmount::from_raw(900))
        .await
        .unwrap();
    assert_eq!(fresh, VotePower::from_raw(300));

    // 5_000 tokens at 50 tokens per power unit
    let carol_power = engine
        .donate("carol", Currency::CkUsdc, "ck-1", TokenAmount::from_raw(5_000))
        .await
        .unwrap();
    assert_eq!(carol_power, VotePower::from_raw(100));

    let system = engine.audit_system_info().await.unwrap();
    assert_eq!(system.donations, 3);
    assert_eq!(system.total_voting_power, VotePower::from_raw(500));
    println!("Total voting power: {}", system.total_voting_power);

    // 3. Grant lifecycle through approval
    println!("\n=== Testing Grant Lifecycle ===");

    let bob = engine.identity.resolve("bob").await.unwrap();
    let grant_id = engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    engine.start_review("bob", grant_id).await.unwrap();
    engine.start_grant_voting(ADMIN, grant_id).await.unwrap();

    engine
        .vote_on_grant("alice", grant_id, VoteChoice::Approve)
        .await
        .unwrap();
    engine
        .vote_on_grant("carol", grant_id, VoteChoice::Reject)
        .await
        .unwrap();

    // The window is still open.
    assert!(matches!(
        engine.finalize_grant_voting(ADMIN, grant_id).await,
        Err(EngineError::Governance(GovernanceError::VotingNotEnded))
    ));

    close_grant_voting(&engine, grant_id).await;
    let decided = engine.finalize_grant_voting(ADMIN, grant_id).await.unwrap();
    // 500 cast >= quorum 100; 400 approve of 500 = 80% >= 60%.
    assert_eq!(decided, Status::Approved);

    let voting = engine.get_grant_voting_status(grant_id).await.unwrap();
    assert_eq!(voting.approval_power, VotePower::from_raw(400));
    assert_eq!(voting.reject_power, VotePower::from_raw(100));
    println!(
        "Tally: {} approve / {} reject",
        voting.approval_power, voting.reject_power
    );

    // 4. Claiming is idempotent and closes the grant
    println!("\n=== Testing Claim Idempotency ===");

    assert!(matches!(
        engine.claim_grant("mallory", grant_id).await,
        Err(EngineError::Governance(GovernanceError::Unauthorized(_)))
    ));

    let first = engine.claim_grant("bob", grant_id).await.unwrap();
    let second = engine.claim_grant("bob", grant_id).await.unwrap();
    assert_eq!(first, second);
    println!("Authorization: {}", first);

    let grant = engine.get_grant(grant_id).await.unwrap();
    assert_eq!(grant.status, Status::Claimed);

    // 5. Donor-facing reads
    println!("\n=== Testing Voting Power Queries ===");

    let alice = engine.identity.resolve("alice").await.unwrap();
    let view = engine.get_voting_power(&alice).await.unwrap().unwrap();
    assert_eq!(view.power, VotePower::from_raw(400));
    assert_eq!(view.changes.len(), 2);

    let donations = engine.get_my_donations("alice").await.unwrap();
    assert_eq!(donations.len(), 2);
    assert_eq!(engine.get_total_voting_power().await, VotePower::from_raw(500));

    // 6. Cached projections match the append-only histories
    println!("\n=== Testing Integrity ===");

    let report = engine.check_integrity().await.unwrap();
    assert_eq!(report.accounts_checked, 2);
    assert_eq!(report.donations_checked, 3);
    assert_eq!(report.total_power, VotePower::from_raw(500));
    println!(
        "Integrity: {} accounts, {} donations",
        report.accounts_checked, report.donations_checked
    );
}

#[tokio::test]
async fn test_same_reference_across_currencies_is_distinct() {
    let engine = test_engine().await;
    engine
        .update_exchange_rates(ADMIN, Currency::Icp, 1)
        .await
        .unwrap();
    engine
        .update_exchange_rates(ADMIN, Currency::CkBtc, 10)
        .await
        .unwrap();

    engine
        .donate("alice", Currency::Icp, "shared-ref", TokenAmount::from_raw(5))
        .await
        .unwrap();
    engine
        .donate("alice", Currency::CkBtc, "shared-ref", TokenAmount::from_raw(80))
        .await
        .unwrap();

    let system = engine.audit_system_info().await.unwrap();
    assert_eq!(system.donations, 2);

    // The scan resolves in declared currency order: ICP's 5, not ckBTC's 8.
    assert_eq!(
        engine.get_donor_credit("shared-ref").await.unwrap(),
        Some(VotePower::from_raw(5))
    );
}

#[tokio::test]
async fn test_quorum_unmet_rejects_grant() {
    let engine = test_engine().await;
    engine
        .update_exchange_rates(ADMIN, Currency::Icp, 1)
        .await
        .unwrap();
    engine
        .donate("dana", Currency::Icp, "tx-1", TokenAmount::from_raw(40))
        .await
        .unwrap();

    let bob = engine.identity.resolve("bob").await.unwrap();
    let grant_id = engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    engine.start_review("bob", grant_id).await.unwrap();
    engine.start_grant_voting(ADMIN, grant_id).await.unwrap();
    engine
        .vote_on_grant("dana", grant_id, VoteChoice::Approve)
        .await
        .unwrap();

    close_grant_voting(&engine, grant_id).await;

    // 40 cast < quorum 100: rejected even at 100% approval.
    let decided = engine.finalize_grant_voting(ADMIN, grant_id).await.unwrap();
    assert_eq!(decided, Status::Rejected);
}

#[tokio::test]
async fn test_rejection_and_cancellation_paths() {
    let engine = test_engine().await;
    let bob = engine.identity.resolve("bob").await.unwrap();

    // Admin rejection out of review.
    let rejected = engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    engine.start_review("bob", rejected).await.unwrap();
    engine.reject_grant(ADMIN, rejected).await.unwrap();
    assert_eq!(
        engine.get_grant(rejected).await.unwrap().status,
        Status::Rejected
    );

    // Applicant withdrawal out of submitted.
    let cancelled = engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    engine.cancel_grant("bob", cancelled).await.unwrap();

    // Terminal grants accept no further transitions.
    assert!(matches!(
        engine.start_review("bob", cancelled).await,
        Err(EngineError::Governance(GovernanceError::InvalidStatus { .. }))
    ));
    assert!(matches!(
        engine.cancel_grant("bob", rejected).await,
        Err(EngineError::Governance(GovernanceError::InvalidStatus { .. }))
    ));
}

#[tokio::test]
async fn test_expired_window_reads_and_blocks_cancel() {
    let engine = test_engine().await;
    let bob = engine.identity.resolve("bob").await.unwrap();

    let grant_id = engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    engine.start_review("bob", grant_id).await.unwrap();
    engine.start_grant_voting(ADMIN, grant_id).await.unwrap();
    close_grant_voting(&engine, grant_id).await;

    // The stored status is still voting; reads derive expired.
    let expired_filter: HashSet<Status> = [Status::Expired].into_iter().collect();
    let listed = engine.get_grants(&expired_filter, 0).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, grant_id);
    assert_eq!(engine.get_grant(grant_id).await.unwrap().status, Status::Voting);

    // An expired window can only be finalized, not withdrawn or vetoed.
    assert!(matches!(
        engine.cancel_grant("bob", grant_id).await,
        Err(EngineError::Governance(GovernanceError::InvalidStatus { .. }))
    ));
    assert!(matches!(
        engine.reject_grant(ADMIN, grant_id).await,
        Err(EngineError::Governance(GovernanceError::InvalidStatus { .. }))
    ));
    let decided = engine.finalize_grant_voting(ADMIN, grant_id).await.unwrap();
    assert_eq!(decided, Status::Rejected);
}

#[tokio::test]
async fn test_grant_listing_pages_by_id() {
    let engine = test_engine().await;
    let bob = engine.identity.resolve("bob").await.unwrap();

    for _ in 0..25 {
        engine.apply_grant("bob", node_grant(bob)).await.unwrap();
    }

    let all = HashSet::new();
    let first_page = engine.get_grants(&all, 0).await;
    let second_page = engine.get_grants(&all, 20).await;
    assert_eq!(first_page.len(), 20);
    assert_eq!(second_page.len(), 5);
    assert_eq!(first_page[0].id.value(), 1);
    assert_eq!(second_page[0].id.value(), 21);

    assert_eq!(engine.get_my_grants("bob").await.unwrap().len(), 25);
    assert_eq!(engine.get_all_grants().await.len(), 25);
}

#[tokio::test]
async fn test_admin_power_adjustments() {
    let engine = test_engine().await;
    let grantee = Principal::from_bytes([0x51; 32]);

    let adjusted = engine
        .adjust_power(ADMIN, grantee, 50, "bootstrap committee power")
        .await
        .unwrap();
    assert_eq!(adjusted, VotePower::from_raw(50));

    // The balance never goes negative.
    let overdraw = engine
        .adjust_power(ADMIN, grantee, -100, "clawback")
        .await;
    assert!(matches!(
        overdraw,
        Err(EngineError::Ledger(LedgerError::InsufficientPower { .. }))
    ));

    let view = engine.get_voting_power(&grantee).await.unwrap().unwrap();
    assert_eq!(view.changes.len(), 1);
    assert_eq!(view.power, VotePower::from_raw(50));

    // Adjustments keep the ledger reconcilable.
    let report = engine.check_integrity().await.unwrap();
    assert_eq!(report.total_power, VotePower::from_raw(50));
}
