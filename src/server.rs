//! HTTP surface: `POST /extract-bill-data`.
//!
//! A thin shim over [`BillExtractor`]. The only decision made here is the
//! status code policy:
//!
//! | Situation | Status | Body |
//! |-----------|--------|------|
//! | body missing, not JSON, or `document` empty | 400 | `{"detail": "..."}` |
//! | pipeline ran (success *or* logical failure) | 200 | [`ExtractionResponse`] |
//!
//! A logical failure still returns 200: the response's `is_success` flag is
//! the signal, and clients get the same JSON shape either way.

use crate::extract::BillExtractor;
use crate::output::{ExtractionRequest, ExtractionResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Route path for the extraction endpoint.
pub const EXTRACT_PATH: &str = "/extract-bill-data";

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<BillExtractor>,
}

/// Request body; `document` is optional here so a missing field gets the
/// same 400 as an empty one.
#[derive(Debug, Deserialize)]
struct ExtractBody {
    document: Option<String>,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    model: String,
}

/// Build the router.
pub fn router(extractor: Arc<BillExtractor>) -> Router {
    Router::new()
        .route(EXTRACT_PATH, post(extract_bill_data))
        .route("/health", get(health))
        .with_state(AppState { extractor })
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, extractor: Arc<BillExtractor>) -> std::io::Result<()> {
    let app = router(extractor);
    let listener = TcpListener::bind(&addr).await?;
    info!("Bill extraction server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn extract_bill_data(
    State(state): State<AppState>,
    body: Result<Json<ExtractBody>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(body)) => ExtractionRequest::new(body.document.unwrap_or_default()),
        Err(rejection) => {
            warn!("Rejected extraction request: {}", rejection.body_text());
            return bad_request(rejection.body_text());
        }
    };

    let request = match request {
        Ok(r) => r,
        Err(e) => return bad_request(e.to_string()),
    };

    let response: ExtractionResponse = state.extractor.extract(&request.document).await;
    (StatusCode::OK, Json(response)).into_response()
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        model: state.extractor.model_name().to_string(),
    })
}

fn bad_request(detail: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorDetail { detail })).into_response()
}
