//! Database connection and schema migrations.
//!
//! The schema enforces the ingestion status machine at the storage layer:
//! a CHECK constraint restricts `status` to the four enumerated values
//! regardless of which code path writes the row.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and indexes. Idempotent — safe to run repeatedly.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestions (
            id TEXT PRIMARY KEY,
            source_type TEXT NOT NULL,
            source_uri TEXT,
            source_actor TEXT,
            raw_object_key TEXT,
            created_at INTEGER NOT NULL,
            status TEXT NOT NULL
                CHECK (status IN ('queued', 'running', 'complete', 'failed')),
            last_error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Notes written by the anchor stage, one per normalized artifact.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id TEXT PRIMARY KEY,
            ingestion_id TEXT NOT NULL,
            body BLOB NOT NULL,
            mime_type TEXT NOT NULL,
            method TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (ingestion_id) REFERENCES ingestions(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingestions_status ON ingestions(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingestions_created_at ON ingestions(created_at DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_ingestion_id ON notes(ingestion_id)")
        .execute(pool)
        .await?;

    Ok(())
}
