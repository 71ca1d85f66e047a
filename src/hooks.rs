//! Stage-completion hooks.
//!
//! Collaborators observe the pipeline by registering callbacks against one
//! of the four stages, optionally filtered by artifact characteristics.
//! Registrations live in an explicit [`HookRegistry`] owned by whoever built
//! the pipeline — there is no process-global table, so tests and multiple
//! pipelines in one process stay isolated.
//!
//! Dispatch is synchronous and ordered by registration. A hook is an
//! observer, not a participant: its failure is logged and isolated, and
//! never alters the ingestion record or aborts the pipeline.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use anyhow::Result;
use tracing::warn;
use uuid::Uuid;

use crate::models::{ExtractedArtifact, Stage};

/// A stage-completion callback: `(ingestion_id, stage, records)`.
///
/// The three-argument shape is the registration contract; anything else
/// fails to compile, so a misconfigured hook can never reach dispatch.
pub type HookCallback = Arc<dyn Fn(Uuid, Stage, &[ExtractedArtifact]) -> Result<()> + Send + Sync>;

/// Optional dispatch filters. Each set filter must be satisfied by at least
/// one record; a hook with no filters always fires.
#[derive(Debug, Clone, Default)]
pub struct HookFilters {
    /// Acceptable record mime types.
    pub mime_types: Option<HashSet<String>>,
    /// Minimum payload size in bytes.
    pub min_size_bytes: Option<usize>,
    /// Acceptable artifact types (matched against each record's `method`).
    pub artifact_types: Option<HashSet<String>>,
}

impl HookFilters {
    fn matches(&self, records: &[ExtractedArtifact]) -> bool {
        if let Some(ref mimes) = self.mime_types {
            if !records.iter().any(|r| mimes.contains(&r.mime_type)) {
                return false;
            }
        }
        if let Some(min) = self.min_size_bytes {
            if !records.iter().any(|r| r.payload.len() >= min) {
                return false;
            }
        }
        if let Some(ref types) = self.artifact_types {
            if !records.iter().any(|r| types.contains(&r.method)) {
                return false;
            }
        }
        true
    }
}

struct HookEntry {
    id: Uuid,
    stage: Stage,
    callback: HookCallback,
    filters: Option<HookFilters>,
}

/// Subscription table mapping stages to callbacks.
///
/// Reads (dispatch) dominate; registration and removal are rare and
/// serialize behind the one lock. Callbacks are invoked outside the lock,
/// so a hook may itself register or unregister hooks.
pub struct HookRegistry {
    hooks: RwLock<Vec<HookEntry>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(Vec::new()),
        }
    }

    /// Register a callback for `stage`. Returns the fresh hook id used for
    /// later removal.
    pub fn register(
        &self,
        stage: Stage,
        callback: HookCallback,
        filters: Option<HookFilters>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        hooks.push(HookEntry {
            id,
            stage,
            callback,
            filters,
        });
        id
    }

    /// Register against a stage given by name. Unknown names are rejected
    /// here, at registration time, never at dispatch.
    pub fn register_named(
        &self,
        stage: &str,
        callback: HookCallback,
        filters: Option<HookFilters>,
    ) -> Result<Uuid> {
        let stage = Stage::parse(stage)?;
        Ok(self.register(stage, callback, filters))
    }

    /// Remove a hook. Returns whether the id was present; a second call
    /// with the same id returns `false`.
    pub fn unregister(&self, hook_id: Uuid) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let before = hooks.len();
        hooks.retain(|h| h.id != hook_id);
        hooks.len() < before
    }

    /// Remove all registrations (process/test reset).
    pub fn clear(&self) {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        hooks.clear();
    }

    pub fn len(&self) -> usize {
        self.hooks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire every hook registered on `stage` whose filters accept `records`,
    /// in registration order. A failing hook is logged and skipped; it does
    /// not affect other hooks or the caller.
    pub fn dispatch(&self, stage: Stage, ingestion_id: Uuid, records: &[ExtractedArtifact]) {
        let matching: Vec<(Uuid, HookCallback)> = {
            let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
            hooks
                .iter()
                .filter(|h| h.stage == stage)
                .filter(|h| h.filters.as_ref().map_or(true, |f| f.matches(records)))
                .map(|h| (h.id, h.callback.clone()))
                .collect()
        };

        for (hook_id, callback) in matching {
            if let Err(e) = callback(ingestion_id, stage, records) {
                warn!(
                    hook_id = %hook_id,
                    stage = %stage,
                    ingestion_id = %ingestion_id,
                    error = %e,
                    "hook failed; continuing"
                );
            }
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
