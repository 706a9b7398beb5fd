//! Repository for the `coordination_keys` table.
//!
//! Every statement treats a row whose `expires_at` has passed as absent.
//! Conditional writes are single statements, so Postgres row locking gives
//! the per-key atomicity the coordination layer relies on.

use std::time::Duration;

use sqlx::PgPool;

use crate::models::coordination_key::CoordinationKey;

/// Column list for `coordination_keys` queries.
const COLUMNS: &str = "key, value, expires_at, created_at, updated_at";

/// Predicate matching rows that have not expired.
const LIVE: &str = "(expires_at IS NULL OR expires_at > NOW())";

/// Provides the atomic key operations behind
/// [`PgKeyValueStore`](crate::store::PgKeyValueStore).
pub struct CoordinationKeyRepo;

impl CoordinationKeyRepo {
    // ── Conditional writes ───────────────────────────────────────────────

    /// Insert `key`, or take over an expired row. Returns `true` if this
    /// call now owns the key.
    pub async fn insert_if_absent(
        pool: &PgPool,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let inserted: Option<String> = sqlx::query_scalar(
            "INSERT INTO coordination_keys (key, value, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3::float8)) \
             ON CONFLICT (key) DO UPDATE SET \
                value = EXCLUDED.value, \
                expires_at = EXCLUDED.expires_at, \
                created_at = NOW(), \
                updated_at = NOW() \
             WHERE coordination_keys.expires_at IS NOT NULL \
               AND coordination_keys.expires_at <= NOW() \
             RETURNING key",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.as_secs_f64())
        .fetch_optional(pool)
        .await?;

        Ok(inserted.is_some())
    }

    /// Upsert `key` unconditionally. `ttl = None` stores without expiry.
    pub async fn upsert(
        pool: &PgPool,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO coordination_keys (key, value, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3::float8)) \
             ON CONFLICT (key) DO UPDATE SET \
                value = EXCLUDED.value, \
                expires_at = EXCLUDED.expires_at, \
                updated_at = NOW()",
        )
        .bind(key)
        .bind(value)
        .bind(ttl.map(|t| t.as_secs_f64()))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Reset the expiry of a live key whose value equals `expected`.
    pub async fn renew_if_equal(
        pool: &PgPool,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE coordination_keys \
             SET expires_at = NOW() + make_interval(secs => $3::float8), updated_at = NOW() \
             WHERE key = $1 AND value = $2 AND {LIVE}"
        );
        let result = sqlx::query(&query)
            .bind(key)
            .bind(expected)
            .bind(ttl.as_secs_f64())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Swap the value of a live key from `expected` to `new`.
    pub async fn replace_if_equal(
        pool: &PgPool,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE coordination_keys \
             SET value = $3, expires_at = NOW() + make_interval(secs => $4::float8), \
                 updated_at = NOW() \
             WHERE key = $1 AND value = $2 AND {LIVE}"
        );
        let result = sqlx::query(&query)
            .bind(key)
            .bind(expected)
            .bind(new)
            .bind(ttl.as_secs_f64())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reset the expiry of a live key.
    pub async fn expire(pool: &PgPool, key: &str, ttl: Duration) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE coordination_keys \
             SET expires_at = NOW() + make_interval(secs => $2::float8), updated_at = NOW() \
             WHERE key = $1 AND {LIVE}"
        );
        let result = sqlx::query(&query)
            .bind(key)
            .bind(ttl.as_secs_f64())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Deletes ──────────────────────────────────────────────────────────

    /// Delete `key`, live or expired. Returns `true` if the removed row was
    /// still live.
    pub async fn delete(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM coordination_keys WHERE key = $1 RETURNING {LIVE}");
        let live: Option<bool> = sqlx::query_scalar(&query)
            .bind(key)
            .fetch_optional(pool)
            .await?;
        Ok(live.unwrap_or(false))
    }

    /// Delete a live key whose value equals `expected`.
    pub async fn delete_if_equal(
        pool: &PgPool,
        key: &str,
        expected: &str,
    ) -> Result<bool, sqlx::Error> {
        let query =
            format!("DELETE FROM coordination_keys WHERE key = $1 AND value = $2 AND {LIVE}");
        let result = sqlx::query(&query)
            .bind(key)
            .bind(expected)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every row whose key starts with `prefix`, expired rows
    /// included. Returns how many of the deleted rows were still live.
    pub async fn delete_prefix(pool: &PgPool, prefix: &str) -> Result<u64, sqlx::Error> {
        let query = format!(
            "WITH removed AS ( \
                 DELETE FROM coordination_keys WHERE key LIKE $1 ESCAPE '\\' \
                 RETURNING expires_at \
             ) \
             SELECT COUNT(*) FROM removed WHERE {LIVE}"
        );
        let live: i64 = sqlx::query_scalar(&query)
            .bind(like_prefix(prefix))
            .fetch_one(pool)
            .await?;
        Ok(live as u64)
    }

    /// Physically remove expired rows.
    pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM coordination_keys WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
        )
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Value of a live key.
    pub async fn get_value(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
        let query = format!("SELECT value FROM coordination_keys WHERE key = $1 AND {LIVE}");
        sqlx::query_scalar(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }

    /// Remaining lifetime of a live key in milliseconds. `None` when absent
    /// or stored without expiry.
    pub async fn ttl_millis(pool: &PgPool, key: &str) -> Result<Option<i64>, sqlx::Error> {
        let millis: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT (EXTRACT(EPOCH FROM (expires_at - NOW())) * 1000)::BIGINT \
             FROM coordination_keys \
             WHERE key = $1 AND expires_at IS NOT NULL AND expires_at > NOW()",
        )
        .bind(key)
        .fetch_optional(pool)
        .await?;
        Ok(millis.flatten())
    }

    /// Live keys starting with `prefix`, sorted ascending.
    pub async fn list_keys(pool: &PgPool, prefix: &str) -> Result<Vec<String>, sqlx::Error> {
        let query = format!(
            "SELECT key FROM coordination_keys \
             WHERE key LIKE $1 ESCAPE '\\' AND {LIVE} ORDER BY key"
        );
        sqlx::query_scalar(&query)
            .bind(like_prefix(prefix))
            .fetch_all(pool)
            .await
    }

    /// Full live rows starting with `prefix`, for operator inspection.
    pub async fn list_live(
        pool: &PgPool,
        prefix: &str,
    ) -> Result<Vec<CoordinationKey>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM coordination_keys \
             WHERE key LIKE $1 ESCAPE '\\' AND {LIVE} ORDER BY key"
        );
        sqlx::query_as::<_, CoordinationKey>(&query)
            .bind(like_prefix(prefix))
            .fetch_all(pool)
            .await
    }

    /// Full live row for one key.
    pub async fn find_live(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<CoordinationKey>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM coordination_keys WHERE key = $1 AND {LIVE}");
        sqlx::query_as::<_, CoordinationKey>(&query)
            .bind(key)
            .fetch_optional(pool)
            .await
    }
}

/// Escape LIKE metacharacters in `prefix` and append the trailing wildcard.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_appends_wildcard() {
        assert_eq!(like_prefix("match:7:"), "match:7:%");
    }

    #[test]
    fn like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("a_b%c\\"), "a\\_b\\%c\\\\%");
    }
}
