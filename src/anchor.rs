//! Anchoring into the durable note store.
//!
//! The terminal pipeline stage links each normalized artifact into the
//! `notes` table, one note per artifact, tagged with the originating
//! ingestion. Collaborators read notes through their own query paths; the
//! pipeline only ever appends here.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::ExtractedArtifact;

/// Persist one note per artifact. Returns the artifacts back as the anchor
/// stage's records so hook dispatch sees what was anchored.
pub async fn anchor_artifacts(
    pool: &SqlitePool,
    ingestion_id: Uuid,
    artifacts: Vec<ExtractedArtifact>,
) -> Result<Vec<ExtractedArtifact>> {
    let now = chrono::Utc::now().timestamp();

    for artifact in &artifacts {
        sqlx::query(
            r#"
            INSERT INTO notes (id, ingestion_id, body, mime_type, method, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(ingestion_id.to_string())
        .bind(&artifact.payload)
        .bind(&artifact.mime_type)
        .bind(&artifact.method)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(artifacts)
}

/// Count notes anchored for one ingestion. Used by status reporting and tests.
pub async fn count_notes(pool: &SqlitePool, ingestion_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE ingestion_id = ?")
        .bind(ingestion_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
