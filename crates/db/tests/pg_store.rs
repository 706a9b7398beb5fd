//! Integration tests for `PgKeyValueStore` against a real database.
//!
//! Verifies the store contract the coordination layer depends on:
//! - set-if-absent admits exactly one writer and treats expired rows as absent
//! - compare operations only act on the expected value
//! - prefix enumeration and deletion stay inside the prefix
//! - the reaper removes expired rows only

use std::time::Duration;

use arena_core::store::KeyValueStore;
use arena_db::models::audit::CreateCoordinationAuditEntry;
use arena_db::repositories::{CoordinationAuditRepo, CoordinationKeyRepo};
use arena_db::PgKeyValueStore;
use sqlx::PgPool;

const LONG: Duration = Duration::from_secs(60);

/// Insert a row that expired a minute ago.
async fn insert_expired(pool: &PgPool, key: &str, value: &str) {
    sqlx::query(
        "INSERT INTO coordination_keys (key, value, expires_at) \
         VALUES ($1, $2, NOW() - INTERVAL '1 minute')",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Test: set_if_absent admits a single writer
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_set_if_absent_single_writer(pool: PgPool) {
    let store = PgKeyValueStore::new(pool);

    assert!(store.set_if_absent("queue:processing", "a", LONG).await.unwrap());
    assert!(!store.set_if_absent("queue:processing", "b", LONG).await.unwrap());
    assert_eq!(
        store.get("queue:processing").await.unwrap().as_deref(),
        Some("a")
    );
}

// ---------------------------------------------------------------------------
// Test: concurrent set_if_absent has exactly one winner
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_concurrent_set_if_absent_one_winner(pool: PgPool) {
    let store = PgKeyValueStore::new(pool);

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .set_if_absent("match:1:draft-start", &format!("replica-{i}"), LONG)
                .await
                .unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

// ---------------------------------------------------------------------------
// Test: expired rows behave as absent
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_expired_row_is_taken_over(pool: PgPool) {
    insert_expired(&pool, "match:2:cancel", "crashed").await;
    let store = PgKeyValueStore::new(pool);

    assert!(store.get("match:2:cancel").await.unwrap().is_none());
    assert!(store.ttl("match:2:cancel").await.unwrap().is_none());
    assert!(!store.renew_if_equal("match:2:cancel", "crashed", LONG).await.unwrap());

    assert!(store.set_if_absent("match:2:cancel", "fresh", LONG).await.unwrap());
    assert_eq!(store.get("match:2:cancel").await.unwrap().as_deref(), Some("fresh"));
}

// ---------------------------------------------------------------------------
// Test: compare operations only act on the expected value
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_compare_operations(pool: PgPool) {
    let store = PgKeyValueStore::new(pool);
    store.set("session:player:1", "s1", Some(LONG)).await.unwrap();

    assert!(!store.replace_if_equal("session:player:1", "s0", "s2", LONG).await.unwrap());
    assert!(store.replace_if_equal("session:player:1", "s1", "s2", LONG).await.unwrap());
    assert_eq!(store.get("session:player:1").await.unwrap().as_deref(), Some("s2"));

    assert!(!store.delete_if_equal("session:player:1", "s1").await.unwrap());
    assert!(store.delete_if_equal("session:player:1", "s2").await.unwrap());
    assert!(store.get("session:player:1").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Test: ttl reflects renewals and keys without expiry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_ttl_and_renewal(pool: PgPool) {
    let store = PgKeyValueStore::new(pool);

    store.set_if_absent("k", "owner", Duration::from_secs(5)).await.unwrap();
    let short = store.ttl("k").await.unwrap().unwrap();
    assert!(short <= Duration::from_secs(5));

    assert!(store.renew_if_equal("k", "owner", LONG).await.unwrap());
    let long = store.ttl("k").await.unwrap().unwrap();
    assert!(long > Duration::from_secs(30));

    store.set("forever", "v", None).await.unwrap();
    assert!(store.ttl("forever").await.unwrap().is_none());
    assert!(store.get("forever").await.unwrap().is_some());
}

// ---------------------------------------------------------------------------
// Test: prefix operations stay inside the prefix
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_prefix_operations(pool: PgPool) {
    let store = PgKeyValueStore::new(pool);
    for key in ["match:7:cancel", "match:7:votes", "match:77:cancel", "player:7:state"] {
        store.set(key, "v", Some(LONG)).await.unwrap();
    }

    let keys = store.keys_with_prefix("match:7:").await.unwrap();
    assert_eq!(keys, vec!["match:7:cancel", "match:7:votes"]);

    assert_eq!(store.delete_prefix("match:7:").await.unwrap(), 2);
    assert!(store.keys_with_prefix("match:7:").await.unwrap().is_empty());
    assert_eq!(store.keys_with_prefix("match:77:").await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_prefix_counts_live_rows(pool: PgPool) {
    insert_expired(&pool, "match:7:accept:1", "o").await;
    let store = PgKeyValueStore::new(pool.clone());
    store.set("match:7:game-end", "o", Some(LONG)).await.unwrap();

    assert_eq!(store.delete_prefix("match:7:").await.unwrap(), 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coordination_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

// ---------------------------------------------------------------------------
// Test: purge removes expired rows only
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_purge_expired(pool: PgPool) {
    insert_expired(&pool, "stale", "x").await;
    let store = PgKeyValueStore::new(pool.clone());
    store.set("fresh", "y", Some(LONG)).await.unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 1);
    let remaining = CoordinationKeyRepo::list_live(&pool, "").await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key, "fresh");
}

// ---------------------------------------------------------------------------
// Test: audit entries are listed per match
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_audit_entries_by_match(pool: PgPool) {
    let entry = CreateCoordinationAuditEntry {
        event_type: "match.cleared".to_string(),
        key: Some("match:5:".to_string()),
        match_id: Some(5),
        player_id: None,
        actor: Some("replica-a".to_string()),
        payload: serde_json::json!({"removed": 4}),
        occurred_at: chrono::Utc::now(),
    };
    CoordinationAuditRepo::insert(&pool, &entry).await.unwrap();

    let entries = CoordinationAuditRepo::list_for_match(&pool, 5, 20).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event_type, "match.cleared");
    assert_eq!(entries[0].payload["removed"], 4);

    assert!(CoordinationAuditRepo::list_for_match(&pool, 6, 20).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: per-match listing keeps the latest entries within the limit
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_audit_entries_by_match_respect_limit(pool: PgPool) {
    let start = chrono::Utc::now();
    for (i, event_type) in ["lock.force_released", "player.state_forced", "match.cleared"]
        .into_iter()
        .enumerate()
    {
        let entry = CreateCoordinationAuditEntry {
            event_type: event_type.to_string(),
            key: None,
            match_id: Some(5),
            player_id: None,
            actor: Some("ops".to_string()),
            payload: serde_json::json!({}),
            occurred_at: start + chrono::Duration::seconds(i as i64),
        };
        CoordinationAuditRepo::insert(&pool, &entry).await.unwrap();
    }

    let entries = CoordinationAuditRepo::list_for_match(&pool, 5, 2).await.unwrap();
    let types: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["player.state_forced", "match.cleared"]);
}
