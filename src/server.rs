// HTTP surface for the pipeline
//
// Two inbound endpoints per tool (a JSON endpoint and a multipart file
// upload) plus /health and the Prometheus /metrics endpoint. Responses
// always carry either the normalized report shape or the error shape
// from the taxonomy: 200 for ok:true, 400 for tool-level ok:false and
// bad input, 404 for unknown tools, 500 for handler/timeout/
// serialization failures.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::metrics;
use crate::pipeline::Pipeline;
use crate::report::NormalizedReport;
use crate::request::{self, Identity, ToolRequest};

/// Header carrying the opaque caller identity. Authentication itself is
/// an upstream concern; absence simply means "do not persist".
pub const IDENTITY_HEADER: &str = "x-scanhub-identity";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<Config>,
}

/// Build the router with all pipeline routes and middleware.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_upload_bytes();

    Router::new()
        .route("/api/{tool}", post(api_tool))
        .route("/api/upload_file/{tool}", post(api_file_upload))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and serve until shutdown.
pub async fn serve(state: AppState) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.bind_addr, state.config.server.port
    )
    .parse()
    .context("Invalid server bind address")?;

    info!("Starting ScanHub server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server address")?;

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

/// JSON endpoint: `{input?, mode?}` body, both fields optional.
async fn api_tool(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let identity = identity_from_headers(&headers);
    let request = match ToolRequest::from_json_body(tool, &body, identity) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };
    run_and_respond(&state, request).await
}

/// Multipart endpoint: exactly one `file` part with an allow-listed
/// extension.
async fn api_file_upload(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let identity = identity_from_headers(&headers);
    let upload = match extract_upload(&state, multipart).await {
        Ok(upload) => upload,
        Err(err) => return err.into_response(),
    };
    let request = ToolRequest::from_upload(tool, upload, identity);
    run_and_respond(&state, request).await
}

async fn extract_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<request::TempUpload, PipelineError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::Input(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            return Err(PipelineError::Input(
                "No file selected for uploading.".to_string(),
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| PipelineError::Input(format!("Failed to read upload: {e}")))?;

        return request::save_upload(
            &state.config.uploads.dir,
            &filename,
            &data,
            &state.config.uploads.allowed_extensions,
        );
    }

    Err(PipelineError::Input(
        "No file part in the request.".to_string(),
    ))
}

async fn run_and_respond(state: &AppState, request: ToolRequest) -> Response {
    match state.pipeline.run(request).await {
        Ok(report) => report_response(report),
        Err(err) => err.into_response(),
    }
}

/// A well-formed report crosses the boundary unchanged; only the status
/// code reflects its `ok` flag.
fn report_response(report: NormalizedReport) -> Response {
    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(report)).into_response()
}

fn identity_from_headers(headers: &HeaderMap) -> Option<Identity> {
    headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(Identity::new)
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}
