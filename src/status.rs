//! Ingestion status queries.
//!
//! The only read path collaborators should use: an ingestion id in, a
//! status snapshot out. Read-only and safe to call while the pipeline is
//! mid-flight — a caller may observe any of the four statuses, including a
//! transient `running`.

use anyhow::{bail, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::Config;
use crate::db;

/// Snapshot of one ingestion's lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub ingestion_id: String,
    pub status: String,
    pub last_error: Option<String>,
}

/// Fetch a snapshot, or `None` when no record with that id exists.
pub async fn try_fetch_status(pool: &SqlitePool, id: Uuid) -> Result<Option<StatusSnapshot>> {
    let row = sqlx::query("SELECT id, status, last_error FROM ingestions WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| StatusSnapshot {
        ingestion_id: row.get("id"),
        status: row.get("status"),
        last_error: row.get("last_error"),
    }))
}

/// Fetch a snapshot; an unknown id is an error surfaced to the caller.
pub async fn fetch_status(pool: &SqlitePool, id: Uuid) -> Result<StatusSnapshot> {
    match try_fetch_status(pool, id).await? {
        Some(snapshot) => Ok(snapshot),
        None => bail!("ingestion not found: {}", id),
    }
}

/// CLI entry point — prints the snapshot or exits nonzero when missing.
pub async fn run_status(config: &Config, id: &str) -> Result<()> {
    let id = match Uuid::parse_str(id) {
        Ok(id) => id,
        Err(_) => {
            eprintln!("Error: '{}' is not a valid ingestion id", id);
            std::process::exit(1);
        }
    };

    let pool = db::connect(config).await?;
    let snapshot = match fetch_status(&pool, id).await {
        Ok(s) => s,
        Err(e) => {
            pool.close().await;
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    pool.close().await;

    println!("--- Ingestion ---");
    println!("id:     {}", snapshot.ingestion_id);
    println!("status: {}", snapshot.status);
    if let Some(ref err) = snapshot.last_error {
        println!("error:  {}", err);
    }

    Ok(())
}
