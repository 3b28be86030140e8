//! Concurrent callers against one file-backed database.
//!
//! A file database gives every pooled connection its own SQLite handle, so
//! these exercise real lock contention rather than a single shared connection.

use std::sync::Arc;

use futures::future::join_all;
use warden_core::{
    EscalationAction, EscalationRule, ManualClock, PolicyError, RetryConfig, Warden,
    WardenConfig, WardenDb,
};

async fn file_warden(dir: &tempfile::TempDir) -> Arc<Warden> {
    let db = WardenDb::open(dir.path().join("warden.db")).await.unwrap();
    let mut config = WardenConfig::default();
    config.retry = RetryConfig {
        max_attempts: 5,
        base_backoff_ms: 5,
        max_backoff_ms: 50,
        jitter_ms: 5,
    };
    Arc::new(Warden::new(
        Arc::new(db),
        Arc::new(ManualClock::new(1_700_000_000)),
        &config,
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn token_is_consumed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let warden = file_warden(&dir).await;
    let token = warden.policy.request_verification("u1", 600).await.unwrap();

    let attempts = (0..16).map(|_| {
        let warden = warden.clone();
        let token = token.clone();
        tokio::spawn(async move { warden.policy.complete_verification(&token).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let successes: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(successes, vec!["u1"]);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(PolicyError::TokenAlreadyConsumed)))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_infractions_are_all_counted() {
    let dir = tempfile::tempdir().unwrap();
    let warden = file_warden(&dir).await;
    warden
        .admin
        .upsert_rule(&EscalationRule::new("ban-at-25", 25, EscalationAction::Ban))
        .await
        .unwrap();

    let calls = (0..25).map(|_| {
        let warden = warden.clone();
        tokio::spawn(async move { warden.policy.handle_infraction("u1", "spam").await })
    });
    let decisions: Vec<_> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    assert_eq!(warden.policy.infraction_count("u1").await.unwrap(), 25);
    // Every count from 1 to 25 was observed exactly once, so only the last
    // caller crossed the threshold.
    assert_eq!(decisions.iter().filter(|d| d.is_some()).count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn counters_are_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let warden = file_warden(&dir).await;

    let calls = (0..20).map(|i| {
        let warden = warden.clone();
        let user = format!("u{}", i % 4);
        tokio::spawn(async move { warden.policy.handle_infraction(&user, "spam").await })
    });
    for result in join_all(calls).await {
        result.unwrap().unwrap();
    }

    for user in ["u0", "u1", "u2", "u3"] {
        assert_eq!(warden.policy.infraction_count(user).await.unwrap(), 5);
    }
}
