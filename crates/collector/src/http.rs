//! Manual `POST /collect` trigger (SPEC_FULL §4.5, §6) — test/debug surface
//! only, not the primary trigger path (that's Q1 `wake_up`).
//!
//! Parses the request body by hand rather than with axum's `Json` extractor
//! so a malformed body reports `400` with our own error shape instead of
//! axum's default rejection response.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pipeline_core::collection::CollectionStats;

use crate::pipeline::CollectorPipeline;
use crate::template::{QualityMode, SourceTemplate};

pub struct AppState {
    pub pipeline: CollectorPipeline,
    pub api_key: Option<String>,
    pub default_max_items: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/collect", post(collect)).with_state(state)
}

#[derive(Debug, Deserialize, Default)]
struct CollectRequest {
    #[serde(default)]
    subreddits: Vec<String>,
    #[serde(default)]
    instances: Vec<String>,
    min_score: Option<i64>,
    max_items: Option<usize>,
}

#[derive(Serialize)]
struct CollectResponse {
    status: &'static str,
    collection_id: String,
    stats: CollectionStats,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

async fn collect(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(expected) = state.api_key.as_deref() {
        let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        if presented != Some(expected) {
            warn!("rejected /collect: missing or incorrect x-api-key");
            return error_response(StatusCode::UNAUTHORIZED, "invalid or missing x-api-key");
        }
    }

    let request: CollectRequest = if body.is_empty() {
        CollectRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("malformed request body: {e}")),
        }
    };

    if request.subreddits.is_empty() && request.instances.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "at least one of subreddits or instances is required");
    }

    let max_items = request.max_items.unwrap_or(state.default_max_items);
    let mut templates = Vec::with_capacity(request.subreddits.len() + request.instances.len());
    for subreddit in &request.subreddits {
        templates.push(SourceTemplate {
            source_spec: format!("reddit:{subreddit}"),
            max_items,
            quality_mode: QualityMode::Permissive,
        });
    }
    for instance in &request.instances {
        templates.push(SourceTemplate {
            source_spec: format!("mastodon:{instance}"),
            max_items,
            quality_mode: QualityMode::Permissive,
        });
    }

    let min_score = request.min_score.map(|v| v as f64);
    match state.pipeline.run(templates, min_score).await {
        Ok((collection_id, stats)) => {
            info!(collection_id = %collection_id, "manual /collect run complete");
            Json(CollectResponse { status: "ok", collection_id, stats }).into_response()
        }
        Err(e) => {
            warn!(error = %e, "manual /collect run failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
