//! Core data models used throughout Intake Harness.
//!
//! These types represent the ingestion records, extraction contexts, and
//! artifacts that flow through the intake pipeline.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The fixed, ordered stage sequence every ingestion runs through.
pub const STAGE_ORDER: [Stage; 4] = [Stage::Store, Stage::Extract, Stage::Normalize, Stage::Anchor];

/// One unit of work in the intake pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Store,
    Extract,
    Normalize,
    Anchor,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Store => "store",
            Stage::Extract => "extract",
            Stage::Normalize => "normalize",
            Stage::Anchor => "anchor",
        }
    }

    /// Parse a stage name. Rejects anything outside the four known stages,
    /// so string-based callers (config, HTTP) can never register against a
    /// stage the pipeline will not dispatch.
    pub fn parse(name: &str) -> Result<Stage> {
        match name {
            "store" => Ok(Stage::Store),
            "extract" => Ok(Stage::Extract),
            "normalize" => Ok(Stage::Normalize),
            "anchor" => Ok(Stage::Anchor),
            other => bail!(
                "unknown stage: '{}'. Known stages: store, extract, normalize, anchor",
                other
            ),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an ingestion record.
///
/// Transitions form the strict order `queued → running → {complete, failed}`.
/// Terminal states never regress; a failed ingestion is resubmitted as a new
/// record, never reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Queued => "queued",
            IngestionStatus::Running => "running",
            IngestionStatus::Complete => "complete",
            IngestionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<IngestionStatus> {
        match s {
            "queued" => Ok(IngestionStatus::Queued),
            "running" => Ok(IngestionStatus::Running),
            "complete" => Ok(IngestionStatus::Complete),
            "failed" => Ok(IngestionStatus::Failed),
            other => bail!("unknown ingestion status: '{}'", other),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestionStatus::Complete | IngestionStatus::Failed)
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One intake attempt and its lifecycle state, as persisted in SQLite.
#[derive(Debug, Clone)]
pub struct IngestionRecord {
    pub id: Uuid,
    pub source_type: String,
    pub source_uri: Option<String>,
    pub source_actor: Option<String>,
    /// Content-addressed key of the raw bytes, set by the `store` stage.
    pub raw_object_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: IngestionStatus,
    pub last_error: Option<String>,
}

/// Ephemeral view of one ingestion handed to extractor predicates and
/// transforms. Extractors treat this as read-only.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    pub ingestion_id: Uuid,
    pub raw_object_key: String,
    pub payload: Vec<u8>,
    pub mime_type: Option<String>,
    pub source_type: String,
    pub source_uri: Option<String>,
    pub source_actor: Option<String>,
}

/// Output of a single stage: zero or more of these flow to hook dispatch,
/// and the `anchor` stage persists the normalized set as notes.
#[derive(Debug, Clone)]
pub struct ExtractedArtifact {
    pub payload: Vec<u8>,
    pub mime_type: String,
    /// The producing extractor's self-reported identifier (e.g. `"text/plain"`).
    pub method: String,
}
