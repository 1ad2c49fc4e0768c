//! SQLite-backed store.
//!
//! Split into focused submodules:
//! - `users` — user creation, lookup, count, deletion
//! - `records` — activity record insertion, retrieval, oldest-first deletion
//! - `reminders` — per-user recurring reminder rows for the scheduler
//!
//! Timestamps are stored as UTC `YYYY-MM-DD HH:MM:SS` TEXT (the same shape
//! SQLite's `datetime('now')` produces) and converted with chrono at the
//! API boundary.

mod records;
mod reminders;
mod users;

pub use reminders::{next_fire_after, Reminder};

use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use teledate_core::config::{shellexpand, StoreConfig};
use teledate_core::error::TeledateError;
use tracing::info;

pub(crate) const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store, running migrations on first use.
    ///
    /// The literal path `:memory:` opens a private in-memory database
    /// (used by tests); it is pinned to a single connection so every
    /// query sees the same database.
    pub async fn new(config: &StoreConfig) -> Result<Self, TeledateError> {
        let in_memory = config.db_path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            let db_path = shellexpand(&config.db_path);
            if let Some(parent) = std::path::Path::new(&db_path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TeledateError::Store(format!("failed to create data dir: {e}")))?;
            }
            format!("sqlite:{db_path}")
        };

        let opts = SqliteConnectOptions::from_str(&url)
            .map_err(|e| TeledateError::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(|e| TeledateError::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {}", config.db_path);

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), TeledateError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| TeledateError::Store(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        TeledateError::Store(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| TeledateError::Store(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    TeledateError::Store(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// Format a UTC timestamp into the stored TEXT shape.
pub(crate) fn fmt_dt(dt: NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

/// Parse a stored TEXT timestamp back into chrono.
pub(crate) fn parse_dt(text: &str) -> Result<NaiveDateTime, TeledateError> {
    NaiveDateTime::parse_from_str(text, DT_FORMAT)
        .map_err(|e| TeledateError::Store(format!("bad stored timestamp '{text}': {e}")))
}
