//! Ingestion pipeline orchestration.
//!
//! Drives one submission through the fixed stage order
//! `store → extract → normalize → anchor`, updating the ingestion record's
//! status and firing hook dispatch after every completed stage.
//!
//! Status machine: `queued → running → {complete, failed}`. The
//! `queued → running` edge is a single atomic check-and-set, so two workers
//! can never double-process one record. A stage failure is captured into
//! `last_error` and the record becomes terminally `failed` — later stages do
//! not run, and retrying means submitting a new record.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::anchor;
use crate::config::Config;
use crate::db;
use crate::extractor::ExtractorRegistry;
use crate::hooks::HookRegistry;
use crate::models::{ExtractedArtifact, ExtractionContext, IngestionRecord, IngestionStatus, Stage};
use crate::normalize::normalize_artifacts;
use crate::store::{FsObjectStore, ObjectStore};

/// One incoming piece of content with its provenance.
#[derive(Debug, Clone)]
pub struct Submission {
    pub source_type: String,
    pub source_uri: Option<String>,
    pub source_actor: Option<String>,
    pub mime_type: Option<String>,
    pub payload: Vec<u8>,
}

/// The stage pipeline plus the registries it consults.
///
/// Registries are shared (`Arc`) so collaborators can register extractors
/// and hooks against the same instances the pipeline dispatches through.
/// Concurrent ingestions only share these read-mostly registries; each
/// record has exactly one active writer.
pub struct IngestionPipeline {
    pool: SqlitePool,
    objects: Arc<dyn ObjectStore>,
    extractors: Arc<ExtractorRegistry>,
    hooks: Arc<HookRegistry>,
    max_payload_bytes: usize,
}

impl IngestionPipeline {
    pub fn new(
        pool: SqlitePool,
        objects: Arc<dyn ObjectStore>,
        extractors: Arc<ExtractorRegistry>,
        hooks: Arc<HookRegistry>,
        max_payload_bytes: usize,
    ) -> Self {
        Self {
            pool,
            objects,
            extractors,
            hooks,
            max_payload_bytes,
        }
    }

    /// Connect the default backends from config: SQLite pool, filesystem
    /// object store, built-in extractors, and an empty hook registry.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::new(
            pool,
            Arc::new(FsObjectStore::new(config.objects.root.clone())),
            Arc::new(ExtractorRegistry::from_config(config)),
            Arc::new(HookRegistry::new()),
            config.intake.max_payload_bytes,
        ))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn extractors(&self) -> &Arc<ExtractorRegistry> {
        &self.extractors
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Create the ingestion record in `queued` and return its id.
    ///
    /// Validation failures (missing source type, oversized payload) are
    /// rejected here — no record is persisted for them. The record is
    /// visible as `queued` before any stage executes.
    pub async fn submit(&self, submission: &Submission) -> Result<Uuid> {
        if submission.source_type.trim().is_empty() {
            bail!("submission rejected: source_type is required");
        }
        if submission.payload.len() > self.max_payload_bytes {
            bail!(
                "submission rejected: payload is {} bytes, limit is {}",
                submission.payload.len(),
                self.max_payload_bytes
            );
        }

        let id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO ingestions (id, source_type, source_uri, source_actor, created_at, status)
            VALUES (?, ?, ?, ?, ?, 'queued')
            "#,
        )
        .bind(id.to_string())
        .bind(&submission.source_type)
        .bind(&submission.source_uri)
        .bind(&submission.source_actor)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(ingestion_id = %id, source_type = %submission.source_type, "ingestion queued");
        Ok(id)
    }

    /// Run the stage sequence for a previously submitted record.
    ///
    /// Returns the record's terminal status. A stage failure is captured
    /// into the record (`failed` + `last_error`) rather than returned as an
    /// error; `Err` here means the pipeline itself could not run (record
    /// already claimed, storage unavailable).
    pub async fn process(
        &self,
        id: Uuid,
        payload: Vec<u8>,
        mime_type: Option<String>,
    ) -> Result<IngestionStatus> {
        self.claim(id).await?;
        let record = self.load_record(id).await?;

        // store
        let raw_object_key = match self.stage_store(id, &payload).await {
            Ok(key) => key,
            Err(e) => return self.fail(id, Stage::Store, e).await,
        };
        let store_records = vec![ExtractedArtifact {
            payload: payload.clone(),
            mime_type: mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            method: Stage::Store.as_str().to_string(),
        }];
        self.hooks.dispatch(Stage::Store, id, &store_records);

        // extract
        let ctx = ExtractionContext {
            ingestion_id: id,
            raw_object_key,
            payload,
            mime_type,
            source_type: record.source_type,
            source_uri: record.source_uri,
            source_actor: record.source_actor,
        };
        let extracted = match self.stage_extract(&ctx) {
            Ok(artifacts) => artifacts,
            Err(e) => return self.fail(id, Stage::Extract, e).await,
        };
        self.hooks.dispatch(Stage::Extract, id, &extracted);

        // normalize
        let normalized = normalize_artifacts(extracted);
        self.hooks.dispatch(Stage::Normalize, id, &normalized);

        // anchor
        let anchored = match anchor::anchor_artifacts(&self.pool, id, normalized).await {
            Ok(artifacts) => artifacts,
            Err(e) => return self.fail(id, Stage::Anchor, e).await,
        };
        self.hooks.dispatch(Stage::Anchor, id, &anchored);

        self.set_terminal(id, IngestionStatus::Complete, None).await?;
        info!(ingestion_id = %id, notes = anchored.len(), "ingestion complete");
        Ok(IngestionStatus::Complete)
    }

    /// Submit and process in one call. The caller still observes the record
    /// pass through `queued` — it is inserted before any stage runs.
    pub async fn ingest(&self, submission: Submission) -> Result<(Uuid, IngestionStatus)> {
        let id = self.submit(&submission).await?;
        let status = self
            .process(id, submission.payload, submission.mime_type)
            .await?;
        Ok((id, status))
    }

    async fn load_record(&self, id: Uuid) -> Result<IngestionRecord> {
        let row = sqlx::query(
            r#"
            SELECT id, source_type, source_uri, source_actor, raw_object_key,
                   created_at, status, last_error
            FROM ingestions WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let id_str: String = row.get("id");
        let status_str: String = row.get("status");
        let created_ts: i64 = row.get("created_at");

        Ok(IngestionRecord {
            id: Uuid::parse_str(&id_str).context("corrupt ingestion id")?,
            source_type: row.get("source_type"),
            source_uri: row.get("source_uri"),
            source_actor: row.get("source_actor"),
            raw_object_key: row.get("raw_object_key"),
            created_at: chrono::DateTime::from_timestamp(created_ts, 0)
                .context("corrupt created_at timestamp")?,
            status: IngestionStatus::parse(&status_str)?,
            last_error: row.get("last_error"),
        })
    }

    /// Atomic `queued → running` check-and-set. At most one caller wins;
    /// every other state loses, including a second concurrent claim.
    async fn claim(&self, id: Uuid) -> Result<()> {
        let result =
            sqlx::query("UPDATE ingestions SET status = 'running' WHERE id = ? AND status = 'queued'")
                .bind(id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            bail!("ingestion {} is not queued (unknown, already claimed, or terminal)", id);
        }
        Ok(())
    }

    async fn stage_store(&self, id: Uuid, payload: &[u8]) -> Result<String> {
        let key = self.objects.put(payload).await?;
        sqlx::query("UPDATE ingestions SET raw_object_key = ? WHERE id = ?")
            .bind(&key)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        debug!(ingestion_id = %id, key = %key, "raw payload stored");
        Ok(key)
    }

    /// Run every matching extractor and merge their artifacts in
    /// registration order. Zero matches is a successful, empty extraction.
    fn stage_extract(&self, ctx: &ExtractionContext) -> Result<Vec<ExtractedArtifact>> {
        let mut artifacts = Vec::new();
        for extractor in self.extractors.matching(ctx) {
            let produced = extractor
                .extract(ctx)
                .with_context(|| format!("extractor '{}' failed", extractor.id()))?;
            artifacts.extend(produced);
        }
        Ok(artifacts)
    }

    /// Record a stage failure and halt. The guard on `status = 'running'`
    /// keeps terminal states immutable even under a racing writer.
    async fn fail(&self, id: Uuid, stage: Stage, error: anyhow::Error) -> Result<IngestionStatus> {
        let message = format!("{}: {:#}", stage, error);
        info!(ingestion_id = %id, stage = %stage, error = %message, "ingestion failed");
        self.set_terminal(id, IngestionStatus::Failed, Some(&message))
            .await?;
        Ok(IngestionStatus::Failed)
    }

    async fn set_terminal(
        &self,
        id: Uuid,
        status: IngestionStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE ingestions SET status = ?, last_error = ? WHERE id = ? AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(last_error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("ingestion {} was not running; refusing to overwrite its status", id);
        }
        Ok(())
    }
}

/// CLI entry point — submits one file's content and reports the outcome.
pub async fn run_submit(config: &Config, submission: Submission) -> Result<()> {
    let pipeline = IngestionPipeline::from_config(config).await?;
    let source_type = submission.source_type.clone();
    let (id, status) = pipeline.ingest(submission).await?;

    println!("submit {}", source_type);
    println!("  ingestion: {}", id);
    println!("  status: {}", status);

    if status == IngestionStatus::Failed {
        let snapshot = crate::status::fetch_status(pipeline.pool(), id).await?;
        eprintln!(
            "Error: {}",
            snapshot.last_error.as_deref().unwrap_or("unknown failure")
        );
        std::process::exit(1);
    }

    let notes = anchor::count_notes(pipeline.pool(), id).await?;
    println!("  notes anchored: {}", notes);
    println!("ok");
    Ok(())
}
