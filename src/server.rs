//! Intake HTTP server.
//!
//! Exposes the submit and status surfaces over a JSON API so collaborators
//! can hand content to the pipeline without linking against it.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ingestions` | Submit content; processing runs on its own task |
//! | `GET`  | `/ingestions/{id}` | Status snapshot for one ingestion |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "ingestion not found: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;

use crate::config::Config;
use crate::extractor::ExtractorRegistry;
use crate::hooks::HookRegistry;
use crate::pipeline::{IngestionPipeline, Submission};
use crate::status::try_fetch_status;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<IngestionPipeline>,
}

/// Starts the intake server with the built-in extractors and no hooks.
///
/// This is the standard entry point used by the `intake serve` command.
/// Embedders that need to observe stage completions or add extractors use
/// [`run_server_with_registries`] instead.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_registries(
        config,
        Arc::new(ExtractorRegistry::from_config(config)),
        Arc::new(HookRegistry::new()),
    )
    .await
}

/// Starts the intake server with caller-built registries.
///
/// Hooks registered on `hooks` fire for every ingestion this server
/// processes; `extractors` replaces the built-in set entirely.
pub async fn run_server_with_registries(
    config: &Config,
    extractors: Arc<ExtractorRegistry>,
    hooks: Arc<HookRegistry>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = crate::db::connect(config).await?;
    let pipeline = IngestionPipeline::new(
        pool,
        Arc::new(crate::store::FsObjectStore::new(config.objects.root.clone())),
        extractors,
        hooks,
        config.intake.max_payload_bytes,
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/ingestions", post(handle_submit))
        .route("/ingestions/{id}", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("intake server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ingestions ============

/// JSON request body for `POST /ingestions`.
#[derive(Deserialize)]
struct SubmitRequest {
    source_type: String,
    #[serde(default)]
    source_uri: Option<String>,
    #[serde(default)]
    source_actor: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    /// Raw content, base64-encoded.
    payload: String,
}

/// JSON response body for `POST /ingestions`.
#[derive(Serialize)]
struct SubmitResponse {
    ingestion_id: String,
    status: String,
}

/// Accepts a submission, queues the record, and spawns processing on its
/// own task so one slow ingestion never blocks another. The caller always
/// sees `queued`; progress is observed through `GET /ingestions/{id}`.
async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let payload = base64::engine::general_purpose::STANDARD
        .decode(&req.payload)
        .map_err(|e| bad_request(format!("payload is not valid base64: {}", e)))?;

    let submission = Submission {
        source_type: req.source_type,
        source_uri: req.source_uri,
        source_actor: req.source_actor,
        mime_type: req.mime_type,
        payload,
    };

    let id = state.pipeline.submit(&submission).await.map_err(|e| {
        let msg = e.to_string();
        if msg.contains("rejected") {
            bad_request(msg)
        } else {
            internal(msg)
        }
    })?;

    let pipeline = state.pipeline.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline
            .process(id, submission.payload, submission.mime_type)
            .await
        {
            error!(ingestion_id = %id, error = %e, "pipeline execution error");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            ingestion_id: id.to_string(),
            status: "queued".to_string(),
        }),
    ))
}

// ============ GET /ingestions/{id} ============

async fn handle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::status::StatusSnapshot>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| bad_request(format!("'{}' is not a valid ingestion id", id)))?;

    let snapshot = try_fetch_status(state.pipeline.pool(), id)
        .await
        .map_err(|e| internal(e.to_string()))?;

    match snapshot {
        Some(s) => Ok(Json(s)),
        None => Err(not_found(format!("ingestion not found: {}", id))),
    }
}
