//! End-to-end pipeline tests against a temporary database and object store.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use uuid::Uuid;

use intake_harness::config::{Config, DbConfig, ExtractorsConfig, IntakeConfig, ObjectsConfig, ServerConfig};
use intake_harness::db;
use intake_harness::extractor::{Extractor, ExtractorRegistry};
use intake_harness::hooks::{HookFilters, HookRegistry};
use intake_harness::models::{
    ExtractedArtifact, ExtractionContext, IngestionStatus, Stage,
};
use intake_harness::pipeline::{IngestionPipeline, Submission};
use intake_harness::status::{fetch_status, try_fetch_status};
use intake_harness::store::FsObjectStore;

fn test_config(root: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: root.path().join("data").join("intake.sqlite"),
        },
        objects: ObjectsConfig {
            root: root.path().join("data").join("objects"),
        },
        intake: IntakeConfig::default(),
        extractors: ExtractorsConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:7431".to_string(),
        },
    }
}

async fn test_pipeline(
    root: &TempDir,
    extractors: Arc<ExtractorRegistry>,
    hooks: Arc<HookRegistry>,
) -> IngestionPipeline {
    let config = test_config(root);
    let pool = db::connect(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    IngestionPipeline::new(
        pool,
        Arc::new(FsObjectStore::new(config.objects.root.clone())),
        extractors,
        hooks,
        config.intake.max_payload_bytes,
    )
}

async fn default_pipeline(root: &TempDir, hooks: Arc<HookRegistry>) -> IngestionPipeline {
    let config = test_config(root);
    test_pipeline(
        root,
        Arc::new(ExtractorRegistry::from_config(&config)),
        hooks,
    )
    .await
}

fn text_submission(payload: &[u8]) -> Submission {
    Submission {
        source_type: "chat".to_string(),
        source_uri: Some("chan://general".to_string()),
        source_actor: Some("tester".to_string()),
        mime_type: Some("text/plain".to_string()),
        payload: payload.to_vec(),
    }
}

/// Records every dispatch it sees: `(stage, records)` per call.
type DispatchLog = Arc<Mutex<Vec<(Stage, Vec<ExtractedArtifact>)>>>;

fn recording_hook(registry: &HookRegistry, stage: Stage, filters: Option<HookFilters>) -> DispatchLog {
    let log: DispatchLog = Arc::new(Mutex::new(Vec::new()));
    let log_inner = log.clone();
    registry.register(
        stage,
        Arc::new(move |_id, stage, records| {
            log_inner.lock().unwrap().push((stage, records.to_vec()));
            Ok(())
        }),
        filters,
    );
    log
}

/// Accepts `text/plain` and always fails, simulating an extractor bug.
struct ExplodingExtractor;

impl Extractor for ExplodingExtractor {
    fn id(&self) -> &str {
        "exploding"
    }
    fn description(&self) -> &str {
        "always fails"
    }
    fn can_extract(&self, ctx: &ExtractionContext) -> bool {
        ctx.mime_type.as_deref() == Some("text/plain")
    }
    fn extract(&self, _ctx: &ExtractionContext) -> anyhow::Result<Vec<ExtractedArtifact>> {
        anyhow::bail!("internal extractor error")
    }
}

#[tokio::test]
async fn submit_creates_queued_record() {
    let root = TempDir::new().unwrap();
    let pipeline = default_pipeline(&root, Arc::new(HookRegistry::new())).await;

    let id = pipeline.submit(&text_submission(b"hello")).await.unwrap();

    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "queued");
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn text_plain_ingestion_completes_and_notifies_extract_hook() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let extract_log = recording_hook(&hooks, Stage::Extract, None);
    let pipeline = default_pipeline(&root, hooks).await;

    let (id, status) = pipeline.ingest(text_submission(b"hello")).await.unwrap();
    assert_eq!(status, IngestionStatus::Complete);

    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "complete");
    assert_eq!(snapshot.last_error, None);

    let log = extract_log.lock().unwrap();
    assert_eq!(log.len(), 1);
    let (stage, records) = &log[0];
    assert_eq!(*stage, Stage::Extract);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "text/plain");
    assert_eq!(records[0].payload, b"hello");

    let notes = intake_harness::anchor::count_notes(pipeline.pool(), id)
        .await
        .unwrap();
    assert_eq!(notes, 1);
}

#[tokio::test]
async fn all_four_stages_dispatch_in_order() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let order: Arc<Mutex<Vec<Stage>>> = Arc::new(Mutex::new(Vec::new()));
    for stage in intake_harness::models::STAGE_ORDER {
        let order_inner = order.clone();
        hooks.register(
            stage,
            Arc::new(move |_id, stage, _records| {
                order_inner.lock().unwrap().push(stage);
                Ok(())
            }),
            None,
        );
    }
    let pipeline = default_pipeline(&root, hooks).await;

    pipeline.ingest(text_submission(b"ordered")).await.unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec![Stage::Store, Stage::Extract, Stage::Normalize, Stage::Anchor]
    );
}

#[tokio::test]
async fn failing_extractor_fails_record_and_halts_pipeline() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let normalize_log = recording_hook(&hooks, Stage::Normalize, None);
    let anchor_log = recording_hook(&hooks, Stage::Anchor, None);

    let mut extractors = ExtractorRegistry::new();
    extractors.register(Box::new(ExplodingExtractor));
    let pipeline = test_pipeline(&root, Arc::new(extractors), hooks).await;

    let (id, status) = pipeline.ingest(text_submission(b"boom")).await.unwrap();
    assert_eq!(status, IngestionStatus::Failed);

    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "failed");
    let last_error = snapshot.last_error.expect("failed record carries an error");
    assert!(last_error.contains("extract"));
    assert!(last_error.contains("internal extractor error"));

    // Later stages never ran.
    assert!(normalize_log.lock().unwrap().is_empty());
    assert!(anchor_log.lock().unwrap().is_empty());
    let notes = intake_harness::anchor::count_notes(pipeline.pool(), id)
        .await
        .unwrap();
    assert_eq!(notes, 0);
}

#[tokio::test]
async fn unrecognized_content_completes_with_empty_extraction() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let extract_log = recording_hook(&hooks, Stage::Extract, None);
    let pipeline = default_pipeline(&root, hooks).await;

    let submission = Submission {
        source_type: "upload".to_string(),
        source_uri: None,
        source_actor: None,
        mime_type: Some("image/png".to_string()),
        payload: b"\x89PNG fake".to_vec(),
    };
    let (id, status) = pipeline.ingest(submission).await.unwrap();
    assert_eq!(status, IngestionStatus::Complete);

    // Extraction dispatched with zero records; nothing anchored.
    let log = extract_log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert!(log[0].1.is_empty());
    let notes = intake_harness::anchor::count_notes(pipeline.pool(), id)
        .await
        .unwrap();
    assert_eq!(notes, 0);
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let root = TempDir::new().unwrap();
    let pipeline = default_pipeline(&root, Arc::new(HookRegistry::new())).await;

    let unknown = Uuid::new_v4();
    assert!(try_fetch_status(pipeline.pool(), unknown)
        .await
        .unwrap()
        .is_none());
    let err = fetch_status(pipeline.pool(), unknown).await.unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn record_is_processed_at_most_once() {
    let root = TempDir::new().unwrap();
    let pipeline = default_pipeline(&root, Arc::new(HookRegistry::new())).await;

    let submission = text_submission(b"only once");
    let id = pipeline.submit(&submission).await.unwrap();
    let status = pipeline
        .process(id, submission.payload.clone(), submission.mime_type.clone())
        .await
        .unwrap();
    assert_eq!(status, IngestionStatus::Complete);

    // A second execution must not re-enter the record.
    let err = pipeline
        .process(id, submission.payload, submission.mime_type)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not queued"));

    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "complete");
}

#[tokio::test]
async fn failed_record_stays_failed() {
    let root = TempDir::new().unwrap();
    let mut extractors = ExtractorRegistry::new();
    extractors.register(Box::new(ExplodingExtractor));
    let pipeline = test_pipeline(&root, Arc::new(extractors), Arc::new(HookRegistry::new())).await;

    let (id, status) = pipeline.ingest(text_submission(b"boom")).await.unwrap();
    assert_eq!(status, IngestionStatus::Failed);

    // Terminal: cannot be claimed again.
    let err = pipeline.process(id, b"boom".to_vec(), None).await.unwrap_err();
    assert!(err.to_string().contains("not queued"));

    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "failed");
}

#[tokio::test]
async fn empty_source_type_is_rejected_without_a_record() {
    let root = TempDir::new().unwrap();
    let pipeline = default_pipeline(&root, Arc::new(HookRegistry::new())).await;

    let mut submission = text_submission(b"hello");
    submission.source_type = "  ".to_string();
    let err = pipeline.submit(&submission).await.unwrap_err();
    assert!(err.to_string().contains("rejected"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingestions")
        .fetch_one(pipeline.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let root = TempDir::new().unwrap();
    let config = test_config(&root);
    let pool = db::connect(&config).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    let pipeline = IngestionPipeline::new(
        pool,
        Arc::new(FsObjectStore::new(config.objects.root.clone())),
        Arc::new(ExtractorRegistry::from_config(&config)),
        Arc::new(HookRegistry::new()),
        8,
    );

    let err = pipeline
        .submit(&text_submission(b"far larger than eight bytes"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rejected"));
}

#[tokio::test]
async fn mime_filtered_hook_skips_non_matching_ingestions() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let filters = HookFilters {
        mime_types: Some(HashSet::from(["text/plain".to_string()])),
        ..Default::default()
    };
    let extract_log = recording_hook(&hooks, Stage::Extract, Some(filters));
    let pipeline = default_pipeline(&root, hooks).await;

    let submission = Submission {
        source_type: "upload".to_string(),
        source_uri: None,
        source_actor: None,
        mime_type: Some("image/png".to_string()),
        payload: b"\x89PNG fake".to_vec(),
    };
    pipeline.ingest(submission).await.unwrap();
    assert!(extract_log.lock().unwrap().is_empty());

    pipeline.ingest(text_submission(b"hello")).await.unwrap();
    assert_eq!(extract_log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failing_hook_does_not_affect_the_record() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    hooks.register(
        Stage::Extract,
        Arc::new(|_, _, _| anyhow::bail!("observer exploded")),
        None,
    );
    let pipeline = default_pipeline(&root, hooks).await;

    let (id, status) = pipeline.ingest(text_submission(b"hello")).await.unwrap();
    assert_eq!(status, IngestionStatus::Complete);
    let snapshot = fetch_status(pipeline.pool(), id).await.unwrap();
    assert_eq!(snapshot.status, "complete");
    assert_eq!(snapshot.last_error, None);
}

#[tokio::test]
async fn store_stage_dispatches_raw_payload() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let store_log = recording_hook(&hooks, Stage::Store, None);
    let pipeline = default_pipeline(&root, hooks).await;

    pipeline.ingest(text_submission(b"raw bytes")).await.unwrap();

    let log = store_log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].1.len(), 1);
    assert_eq!(log[0].1[0].payload, b"raw bytes");
    assert_eq!(log[0].1[0].method, "store");
}

#[tokio::test]
async fn resubmission_creates_a_new_record() {
    let root = TempDir::new().unwrap();
    let pipeline = default_pipeline(&root, Arc::new(HookRegistry::new())).await;

    let (first, _) = pipeline.ingest(text_submission(b"same bytes")).await.unwrap();
    let (second, _) = pipeline.ingest(text_submission(b"same bytes")).await.unwrap();
    assert_ne!(first, second);

    assert_eq!(fetch_status(pipeline.pool(), first).await.unwrap().status, "complete");
    assert_eq!(fetch_status(pipeline.pool(), second).await.unwrap().status, "complete");
}

#[tokio::test]
async fn markdown_ingestion_normalizes_before_anchoring() {
    let root = TempDir::new().unwrap();
    let hooks = Arc::new(HookRegistry::new());
    let anchor_log = recording_hook(&hooks, Stage::Anchor, None);
    let pipeline = default_pipeline(&root, hooks).await;

    let submission = Submission {
        source_type: "vault".to_string(),
        source_uri: None,
        source_actor: None,
        mime_type: Some("text/markdown".to_string()),
        payload: b"# Title\r\n\r\n\r\nbody text   ".to_vec(),
    };
    let (_, status) = pipeline.ingest(submission).await.unwrap();
    assert_eq!(status, IngestionStatus::Complete);

    let log = anchor_log.lock().unwrap();
    assert_eq!(log.len(), 1);
    let text = String::from_utf8(log[0].1[0].payload.clone()).unwrap();
    assert_eq!(log[0].1[0].method, "text/markdown");
    assert!(!text.contains('#'));
    assert!(!text.contains('\r'));
    assert!(text.contains("Title"));
    assert!(text.contains("body text"));
}
