//! HTTP gateway server.
//!
//! Routes the upload form, the recognition endpoint and the ops API onto
//! one shared [`OcrService`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ocrgate_core::{GatewayError, RecognitionResult};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::control_ui;
use crate::health_api;
use crate::pipeline::{Upload, UploadedFile};
use crate::service::OcrService;

/// Room for multipart boundaries and the language field on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<OcrService>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(service: Arc<OcrService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }
}

/// JSON error body `{"error": "..."}` with a status chosen per failure kind.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Busy | GatewayError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Oversize { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Construction(_)
            | GatewayError::Recognition(_)
            | GatewayError::Io(_)
            | GatewayError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn build_router(state: GatewayState) -> Router {
    let body_limit = usize::try_from(state.service.pipeline_config().max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/ocr", get(control_ui::upload_page).post(recognize))
        .route("/ocr/", get(control_ui::upload_page).post(recognize))
        .route("/api/health", get(health_api::get_health))
        .route("/api/stats", get(health_api::get_stats))
        .route("/api/stats/reset", post(health_api::reset_stats))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for `POST /ocr/`.
async fn recognize(
    State(state): State<GatewayState>,
    mut multipart: Multipart,
) -> Result<Json<RecognitionResult>, ApiError> {
    let upload = read_upload(&mut multipart).await?;
    let result = state.service.submit(upload).await?;
    Ok(Json(result))
}

/// Collects the `img_file` and `language` fields; anything else is ignored.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("img_file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                upload.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            Some("language") => upload.languages = Some(field.text().await?),
            _ => {}
        }
    }
    Ok(upload)
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")
}

/// Starts the Axum HTTP server for the gateway.
#[instrument(skip(state, shutdown))]
pub async fn start_server(
    addr: SocketAddr,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Gateway HTTP server listening on {}", addr);
    serve(listener, state, shutdown).await
}
