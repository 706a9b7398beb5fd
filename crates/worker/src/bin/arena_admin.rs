//! Operator tool for incident recovery on the shared coordination store.
//!
//! Every mutating command is logged on the `arena::audit` target and written
//! to `coordination_audit_log` before the tool exits.

use std::sync::Arc;

use anyhow::Context;
use arena_coord::Coordinator;
use arena_core::player_state::PlayerState;
use arena_core::store::KeyValueStore;
use arena_core::types::{MatchId, PlayerId};
use arena_db::repositories::{CoordinationAuditRepo, CoordinationKeyRepo};
use arena_db::{DbPool, PgKeyValueStore};
use arena_events::{AuditPersistence, EventBus};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "arena-admin")]
#[command(about = "Operator recovery tool for arena coordination state", long_about = None)]
struct Args {
    /// Postgres URL of the coordination store. Falls back to `DATABASE_URL`.
    #[arg(long)]
    database_url: Option<String>,
    /// Name recorded in the audit trail for mutating commands.
    #[arg(long)]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete a lock regardless of its holder.
    ForceRelease {
        #[arg(long)]
        key: String,
    },
    /// Overwrite a player's state without transition validation.
    ForceState {
        #[arg(long)]
        player_id: PlayerId,
        /// Target state, e.g. `AVAILABLE` or `in-queue`.
        #[arg(long)]
        state: PlayerState,
    },
    /// Show one live key with its holder and remaining TTL.
    InspectKey {
        #[arg(long)]
        key: String,
    },
    /// List live keys under a prefix.
    ListKeys {
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Remove every lock and record of a match.
    ClearMatch {
        #[arg(long)]
        match_id: MatchId,
    },
    /// Physically delete expired keys now.
    PurgeExpired,
    /// Show the latest audit entries, optionally for one match.
    Audit {
        #[arg(long)]
        match_id: Option<MatchId>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arena::audit=warn,arena_coord=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let database_url = match args.database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("--database-url or DATABASE_URL must be set")?,
    };
    let actor = args
        .actor
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "arena-admin".to_string());

    let pool = arena_db::create_pool(&database_url, 2)
        .await
        .context("failed to connect to the coordination database")?;
    let store: Arc<dyn KeyValueStore> = Arc::new(PgKeyValueStore::new(pool.clone()));
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let coordinator = Coordinator::new(store, Arc::clone(&bus));

    match args.command {
        Command::ForceRelease { key } => {
            let removed = coordinator.lock.force_release(&key, &actor).await?;
            if removed {
                println!("released {key}");
            } else {
                println!("{key} was not held");
            }
        }
        Command::ForceState { player_id, state } => {
            let previous = coordinator
                .players
                .force_set_state(player_id, state, &actor)
                .await?;
            println!("player {player_id}: {previous} -> {state}");
        }
        Command::InspectKey { key } => {
            let row = CoordinationKeyRepo::find_live(&pool, &key)
                .await
                .context("failed to read key")?;
            match row {
                Some(row) => {
                    let remaining = row
                        .remaining(chrono::Utc::now())
                        .map(|d| format!("{}ms", d.num_milliseconds()))
                        .unwrap_or_else(|| "no expiry".to_string());
                    println!("key:        {}", row.key);
                    println!("value:      {}", row.value);
                    println!("remaining:  {remaining}");
                    println!("updated_at: {}", row.updated_at);
                }
                None => println!("{key} is not held"),
            }
        }
        Command::ListKeys { prefix } => {
            let rows = CoordinationKeyRepo::list_live(&pool, &prefix)
                .await
                .context("failed to list keys")?;
            let now = chrono::Utc::now();
            for row in &rows {
                let remaining = row
                    .remaining(now)
                    .map(|d| format!("{}ms", d.num_milliseconds()))
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<48} {:>10}  {}", row.key, remaining, row.value);
            }
            println!("{} live key(s)", rows.len());
        }
        Command::ClearMatch { match_id } => {
            let removed = coordinator.matches.clear_match(match_id, &actor).await?;
            println!("match {match_id}: removed {removed} key(s)");
        }
        Command::PurgeExpired => {
            let purged = coordinator.store().purge_expired().await?;
            println!("purged {purged} expired key(s)");
        }
        Command::Audit { match_id, limit } => {
            let entries = match match_id {
                Some(id) => CoordinationAuditRepo::list_for_match(&pool, id, limit).await,
                None => CoordinationAuditRepo::list_recent(&pool, limit).await,
            }
            .context("failed to read audit log")?;
            for entry in entries {
                println!(
                    "{} {:<22} actor={} key={} payload={}",
                    entry.occurred_at,
                    entry.event_type,
                    entry.actor.as_deref().unwrap_or("-"),
                    entry.key.as_deref().unwrap_or("-"),
                    entry.payload,
                );
            }
        }
    }

    persist_audit_events(&pool, &mut events).await?;
    Ok(())
}

/// Write the audited events this invocation produced.
async fn persist_audit_events(
    pool: &DbPool,
    events: &mut broadcast::Receiver<arena_events::CoordinationEvent>,
) -> anyhow::Result<()> {
    while let Ok(event) = events.try_recv() {
        if event.is_audited() {
            AuditPersistence::record(pool, &event)
                .await
                .with_context(|| format!("failed to write audit entry for {}", event.event_type))?;
        }
    }
    Ok(())
}
