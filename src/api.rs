// src/api.rs
//! Thin admin surface over the orchestrator. The product's own routing layer
//! lives elsewhere; this exists for operators and health checks.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::IngestError;
use crate::ingest::IngestionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<IngestionOrchestrator>,
}

pub fn router(orchestrator: Arc<IngestionOrchestrator>) -> Router {
    let state = AppState { orchestrator };
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ingest", post(full_refresh))
        .route("/ingest/{category}", post(ingest_category))
        .route("/articles/{category}", get(articles))
        .route("/quota", get(quota))
        .route("/cache/stats", get(cache_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn error_response(e: &IngestError) -> Response {
    let body = match e {
        IngestError::Refresh { failed } => json!({ "error": e.to_string(), "failed": failed }),
        IngestError::Persistence { category, .. } => {
            json!({ "error": e.to_string(), "category": category })
        }
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

async fn ingest_category(State(state): State<AppState>, Path(category): Path<String>) -> Response {
    match state.orchestrator.trigger_ingestion(&category).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn full_refresh(State(state): State<AppState>) -> Response {
    match state.orchestrator.trigger_full_refresh().await {
        Ok(reports) => Json(reports).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    20
}

async fn articles(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<PageQuery>,
) -> Response {
    let payload = state
        .orchestrator
        .articles_page(&category, q.page, q.limit)
        .await;
    ([(header::CONTENT_TYPE, "application/json")], payload).into_response()
}

async fn quota(State(state): State<AppState>) -> Response {
    Json(state.orchestrator.quota_snapshot()).into_response()
}

async fn cache_stats(State(state): State<AppState>) -> Response {
    Json(state.orchestrator.cache_stats()).into_response()
}
