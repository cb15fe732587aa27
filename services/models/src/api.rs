use crate::animate::{animate, AnimateRequest, AnimationResult};
use crate::catalog::{list_all, AnimationCatalog};
use crate::config::ApiConfig;
use crate::error::{ModelError, Result as ModelResult};
use crate::model_registry::{ModelRecord, ModelRegistry};
use crate::presets::PresetTable;
use crate::upload;
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub presets: &'static PresetTable,
    /// Largest accepted upload request body in bytes
    pub max_upload_bytes: usize,
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub model: ModelRecord,
}

/// Model list response
#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub count: usize,
    pub models: Vec<ModelRecord>,
}

/// Delete response
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let index = ServeFile::new(config.static_dir.join("index.html"));
    let assets = ServeDir::new(&config.static_dir);

    let upload_routes = Router::new()
        .route("/api/upload", post(upload_model))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.max_upload_bytes));

    Router::new()
        .route("/api", get(api_info))
        .route("/api/health", get(health_check))
        .merge(upload_routes)
        .route("/api/models", get(list_models))
        .route("/api/models/:model_id", get(get_model).delete(delete_model))
        .route("/api/models/:model_id/download", get(download_model))
        .route("/api/animate", post(animate_model))
        .route("/api/animations", get(list_animations))
        .route_service("/", index)
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API metadata endpoint
async fn api_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "3D Animation Agent API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "/api/upload",
            "models": "/api/models",
            "model": "/api/models/{model_id}",
            "download": "/api/models/{model_id}/download",
            "animate": "/api/animate",
            "animations": "/api/animations",
            "health": "/api/health"
        }
    }))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Accept a multipart upload with the model in the `file` field
#[instrument(skip(state, multipart))]
async fn upload_model(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ModelResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ModelError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let model = upload::upload(&state.registry, &filename, field).await?;

        return Ok(Json(UploadResponse {
            success: true,
            message: "Model uploaded successfully".to_string(),
            model,
        }));
    }

    Err(ModelError::InvalidUpload(
        "Missing 'file' field in multipart body".to_string(),
    ))
}

/// List all uploaded models
#[instrument(skip(state))]
async fn list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    let models = state.registry.list();

    Json(ModelListResponse {
        count: models.len(),
        models,
    })
}

/// Get a single model's metadata
#[instrument(skip(state))]
async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ModelResult<Json<ModelRecord>> {
    state.registry.get(&model_id).map(Json)
}

/// Stream a model's bytes under its original file name
#[instrument(skip(state))]
async fn download_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ModelResult<Response> {
    let download = state.registry.download(&model_id).await?;
    let body = Body::from_stream(ReaderStream::new(download.file));

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&download.filename),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(download.size)),
        ],
        body,
    )
        .into_response())
}

/// Delete a model and its file
#[instrument(skip(state))]
async fn delete_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ModelResult<Json<DeleteResponse>> {
    state.registry.delete(&model_id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: "Model deleted successfully".to_string(),
    }))
}

/// Resolve an animation preset for a model
#[instrument(skip(state, payload))]
async fn animate_model(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnimateRequest>, JsonRejection>,
) -> ModelResult<Json<AnimationResult>> {
    let Json(request) = payload.map_err(|e| {
        warn!(error = %e, "Malformed animation request");
        ModelError::InvalidRequest(e.body_text())
    })?;

    let result = animate(state.presets, request).inspect_err(|e| {
        warn!(error = %e, "Animation request rejected");
    })?;

    metrics::counter!("models.animations.resolved").increment(1);
    Ok(Json(result))
}

/// List all animations grouped by category
async fn list_animations() -> Json<AnimationCatalog> {
    Json(list_all())
}

/// `Content-Disposition` for a download, quoting plain ASCII names and
/// RFC 5987-encoding everything else
fn content_disposition(filename: &str) -> HeaderValue {
    let plain = !filename.is_empty()
        && filename
            .chars()
            .all(|c| (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\');

    let value = if plain {
        format!("attachment; filename=\"{}\"", filename)
    } else {
        let encoded: String = filename
            .bytes()
            .map(|b| match b {
                b'a'..=b'z'
                | b'A'..=b'Z'
                | b'0'..=b'9'
                | b'!'
                | b'#'
                | b'$'
                | b'&'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~' => (b as char).to_string(),
                _ => format!("%{:02X}", b),
            })
            .collect();
        format!("attachment; filename*=utf-8''{}", encoded)
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Start the HTTP API server, running until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = config.listen_addr();

    info!(address = %addr, "Starting models API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
