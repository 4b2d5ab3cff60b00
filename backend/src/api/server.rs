//! HTTP Server for the ctqflow API.
//!
//! Pipelines are synchronous, so each request runs on the blocking pool.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/transform`  | Grid + info + master → tidy records  |
//! | POST   | `/api/verify`     | Same body → verified records, reports|
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, TransformRequest, TransformResponse, VerifyResponse};
use crate::error::{PipelineError, ServerResult};
use crate::transform::pipeline::{transform_grid, verify_output};

type ApiError = (StatusCode, Json<Value>);

/// Build the application router
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/transform", post(transform))
        .route("/api/verify", post(verify))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 ctqflow server running on http://localhost:{}", port);
    println!("   POST /api/transform - Grid to tidy records");
    println!("   POST /api/verify    - Tidy records checked against spec");
    println!("   GET  /api/logs      - SSE log stream");
    println!("   GET  /health        - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ctqflow",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "transform": "POST /api/transform",
            "verify": "POST /api/verify",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Caller mistakes are 422, everything else 500.
pub fn status_for(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::Grid(_) | PipelineError::Schema(_) | PipelineError::InvalidDateBound(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn pipeline_error(err: PipelineError) -> ApiError {
    log_error(format!("Pipeline failed: {}", err));
    (status_for(&err), Json(error_response(&err.to_string())))
}

async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| {
            log_error(format!("Worker failed: {}", e));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&e.to_string())))
        })?
        .map_err(pipeline_error)
}

/// Transform endpoint
async fn transform(Json(req): Json<TransformRequest>) -> Result<Json<TransformResponse>, ApiError> {
    log_info(format!(
        "📥 Transform request: {} × {} grid, {} master rows",
        req.grid.height(),
        req.grid.width(),
        req.master.len()
    ));

    let output = run_blocking(move || transform_grid(&req.grid, &req.info, &req.master, &req.options)).await?;
    Ok(Json(TransformResponse::from(output)))
}

/// Verify endpoint
async fn verify(Json(req): Json<TransformRequest>) -> Result<Json<VerifyResponse>, ApiError> {
    log_info(format!(
        "📥 Verify request: {} × {} grid, {} master rows",
        req.grid.height(),
        req.grid.width(),
        req.master.len()
    ));

    let response = run_blocking(move || {
        let output = transform_grid(&req.grid, &req.info, &req.master, &req.options)?;
        let verification = verify_output(&output.records, &req.master, &req.options)?;
        Ok(VerifyResponse::new(output.summary, verification))
    })
    .await?;

    Ok(Json(response))
}
