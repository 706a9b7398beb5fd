use std::str::FromStr;
use std::time::Duration;

use arena_core::error::CoreError;

/// Replica configuration loaded from environment variables.
///
/// Lock TTLs are named constants in `arena_core::keys::ttl`, not settings.
#[derive(Debug, Clone)]
pub struct ReplicaConfig {
    /// Postgres URL of the shared coordination store.
    pub database_url: String,
    /// Owner value this replica uses for queue election.
    pub replica_id: String,
    /// Interval between queue-processing elections.
    pub queue_tick: Duration,
    /// Interval between physical purges of expired keys.
    pub reaper_interval: Duration,
    /// Interval between lock monitor snapshots.
    pub monitor_interval: Duration,
    pub db_max_connections: u32,
}

impl ReplicaConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default          |
    /// |-------------------------|------------------|
    /// | `DATABASE_URL`          | required         |
    /// | `REPLICA_ID`            | random UUID v4   |
    /// | `QUEUE_TICK_MS`         | `1000`           |
    /// | `REAPER_INTERVAL_SECS`  | `60`             |
    /// | `MONITOR_INTERVAL_SECS` | `30`             |
    /// | `DB_MAX_CONNECTIONS`    | `20`             |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("DATABASE_URL must be set".into()))?;

        let replica_id = lookup("REPLICA_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let queue_tick_ms: u64 = parse_or(&lookup, "QUEUE_TICK_MS", 1000)?;
        let reaper_secs: u64 = parse_or(&lookup, "REAPER_INTERVAL_SECS", 60)?;
        let monitor_secs: u64 = parse_or(&lookup, "MONITOR_INTERVAL_SECS", 30)?;
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?;

        if queue_tick_ms == 0 || reaper_secs == 0 || monitor_secs == 0 {
            return Err(CoreError::Validation(
                "Task intervals must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_url,
            replica_id,
            queue_tick: Duration::from_millis(queue_tick_ms),
            reaper_interval: Duration::from_secs(reaper_secs),
            monitor_interval: Duration::from_secs(monitor_secs),
            db_max_connections,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, CoreError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{name} must be a valid number, got '{raw}'"))),
        None => Ok(default),
    }
}
