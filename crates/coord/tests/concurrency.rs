//! Cross-task contention tests for the coordination services.
//!
//! Each test shares one `MemoryStore` between many tokio tasks on a
//! multi-threaded runtime, standing in for several replicas racing on the
//! shared store.

use std::sync::Arc;
use std::time::Duration;

use arena_coord::{DistributedLock, MemoryStore, RetryPolicy, SessionBinder, VoteAggregator};
use arena_core::store::KeyValueStore;
use futures::future::join_all;

fn shared_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}

// ---------------------------------------------------------------------------
// Test: N concurrent acquirers, exactly one winner
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acquire_has_single_winner() {
    let lock = DistributedLock::new(shared_store());

    let handles = (0..32).map(|i| {
        let lock = lock.clone();
        tokio::spawn(async move {
            lock.acquire("match:1:game:start", &format!("replica-{i}"), Duration::from_secs(10))
                .await
                .unwrap()
        })
    });

    let winners = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

// ---------------------------------------------------------------------------
// Test: concurrent sessions for one player, exactly one bound
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_binds_leave_one_session() {
    let sessions = SessionBinder::new(DistributedLock::new(shared_store()));

    let handles = (0..16).map(|i| {
        let sessions = sessions.clone();
        tokio::spawn(async move { sessions.bind(7, &format!("session-{i}")).await.unwrap() })
    });

    let bound: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .filter_map(|r| r.unwrap())
        .collect();
    assert_eq!(bound.len(), 1);
    assert_eq!(sessions.session_of(7).await.unwrap(), bound.first().cloned());
}

// ---------------------------------------------------------------------------
// Test: concurrent votes are all counted exactly once
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_sum_to_voter_count() {
    let votes = VoteAggregator::new(DistributedLock::new(shared_store()))
        .with_retry(RetryPolicy::new(500, Duration::from_millis(1)));

    let handles = (0..32i64).map(|player| {
        let votes = votes.clone();
        tokio::spawn(async move {
            let candidate = if player % 3 == 0 { "red" } else { "blue" };
            votes.register_vote(77, player, candidate).await.unwrap()
        })
    });
    for handle in join_all(handles).await {
        handle.unwrap();
    }

    let counts = votes.count_votes(77).await.unwrap();
    assert_eq!(counts.values().sum::<u32>(), 32);
    assert_eq!(counts.get("red"), Some(&11));
    assert_eq!(counts.get("blue"), Some(&21));
    assert_eq!(votes.voter_count(77).await.unwrap(), 32);
}

// ---------------------------------------------------------------------------
// Test: concurrent vote changes by the same player keep one ballot
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_changes_keep_one_ballot_per_player() {
    let votes = VoteAggregator::new(DistributedLock::new(shared_store()))
        .with_retry(RetryPolicy::new(500, Duration::from_millis(1)));

    let handles = ["red", "blue", "green", "red", "blue", "green"].map(|candidate| {
        let votes = votes.clone();
        tokio::spawn(async move { votes.register_vote(5, 1, candidate).await.unwrap() })
    });
    for handle in join_all(handles).await {
        handle.unwrap();
    }

    let counts = votes.count_votes(5).await.unwrap();
    assert_eq!(counts.values().sum::<u32>(), 1);
    assert_eq!(votes.voter_count(5).await.unwrap(), 1);
}
