//! JSON HTTP surface.
//!
//! A thin request layer over the [`Gateway`]: it decodes JSON bodies,
//! invokes the operations, and maps the gateway error taxonomy onto HTTP
//! statuses. No retries happen here; collaborator failures surface as
//! 502 with enough detail for the caller to decide whether to retry the
//! whole ingest or just re-drive activation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/docs/ingest` | Ingest a document and activate the new version |
//! | `POST` | `/v1/docs/activate` | Re-drive activation for an upserted version |
//! | `POST` | `/v1/search` | ACL-filtered similarity search |
//! | `GET`  | `/healthz` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "missing_fields", "message": "invalid input: missing_fields" } }
//! ```

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::{GatewayError, IndexStep};
use crate::gateway::{ActivateRequest, Gateway, IngestRequest, SearchRequest};
use crate::models::SearchHit;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
}

/// Build the router and serve until shutdown is signalled.
pub async fn run_server(config: &Config, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    // Collection creation is best-effort at startup; the index may come
    // up later, in which case the first ingest surfaces the error.
    if let Err(e) = gateway.ensure_collection().await {
        tracing::warn!(error = %format!("{e:#}"), "ensure collection failed at startup");
    }

    let app = router(config, gateway);

    tracing::info!(addr = %bind_addr, "kb-gateway listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Router construction, separated from [`run_server`] so tests can drive
/// it without binding a socket.
pub fn router(config: &Config, gateway: Arc<Gateway>) -> Router {
    let state = AppState { gateway };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/v1/docs/ingest",
            post(handle_ingest).layer(DefaultBodyLimit::max(config.limits.max_content_bytes)),
        )
        .route("/v1/docs/activate", post(handle_activate))
        .route("/v1/search", post(handle_search))
        .route("/healthz", get(handle_health))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    } else {
        tracing::info!("shutdown signal received");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidInput { code } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: code.to_string(),
                message: err.to_string(),
            },
            GatewayError::EmbeddingUnavailable(source) => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: "embed_failed".to_string(),
                message: format!("{source:#}"),
            },
            GatewayError::IndexUnavailable { step, source } => AppError {
                status: StatusCode::BAD_GATEWAY,
                code: match step {
                    IndexStep::Upsert => "index_upsert_failed",
                    IndexStep::Activate => "activate_failed",
                    IndexStep::Search => "index_search_failed",
                }
                .to_string(),
                message: format!("{source:#}"),
            },
        }
    }
}

fn invalid_json(err: impl std::fmt::Display) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid_json".to_string(),
        message: err.to_string(),
    }
}

/// Decode a request body into its typed shape, mapping both parse
/// failures (axum's rejection) and shape failures to the `invalid_json`
/// contract instead of axum's plain-text default.
fn decode<T: DeserializeOwned>(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(invalid_json)?;
    serde_json::from_value(value).map_err(invalid_json)
}

// ============ Handlers ============

async fn handle_ingest(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: IngestRequest = decode(body)?;
    let outcome = state.gateway.ingest(req).await?;
    Ok(Json(outcome))
}

async fn handle_activate(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: ActivateRequest = decode(body)?;
    state.gateway.activate(req).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let req: SearchRequest = decode(body)?;
    let results = state.gateway.search(req).await?;
    Ok(Json(SearchResponse { results }))
}

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
