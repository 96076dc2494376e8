// tests/api_http.rs
//
// HTTP-level tests for the admin Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /ingest/{category}  (report JSON)
// - GET /articles/{category} (read-through page)
// - GET /quota, GET /cache/stats
// - POST /ingest             (full refresh)

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use news_ingest_core::cache::{ArticleCache, CacheConfig, CachePolicy, InMemoryCacheStore};
use news_ingest_core::clock::{Clock, ManualClock};
use news_ingest_core::config::OrchestratorConfig;
use news_ingest_core::dedup::Deduplicator;
use news_ingest_core::ingest::providers::StaticSourceClient;
use news_ingest_core::ingest::types::{RawArticle, SourceClient};
use news_ingest_core::quota::budget::DEFAULT_HOURLY_BUDGET;
use news_ingest_core::quota::{ProviderQuota, QuotaAllocator};
use news_ingest_core::store::InMemoryArticleStore;
use news_ingest_core::{api, IngestionOrchestrator};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

fn story(id: &str, title: &str) -> RawArticle {
    RawArticle {
        external_id: Some(id.into()),
        title: title.into(),
        description: "From our correspondent in Chennai.".into(),
        body: String::new(),
        url: format!("https://indianexpress.com/article/{id}"),
        source_name: "Indian Express".into(),
        author: None,
        published_at: Some(Utc::now()),
        category_hint: None,
    }
}

/// Build the same Router the binary uses, over in-memory collaborators.
fn test_router() -> Router {
    // Wall-clock "now" so store lookbacks line up with published_at.
    let clock = Arc::new(ManualClock::new(Utc::now().fixed_offset()));
    let quota = ProviderQuota {
        source: "static".into(),
        daily_limit: 50,
        hourly_limit: 10,
        conservative_limit: 45,
        priority: 1,
        used_today: 0,
        used_hour: 0,
        reserved: 0,
        errors_today: 0,
        last_error: None,
        last_reset: clock.now(),
        active: true,
        categories: vec![],
    };
    let allocator = Arc::new(QuotaAllocator::from_quotas(vec![quota], clock.clone(), [10; 24]));
    let client: Arc<dyn SourceClient> = Arc::new(StaticSourceClient::new(
        "static",
        vec![
            story("tn-1", "Chennai metro phase two opens to commuters"),
            story("tn-2", "Tamil Nadu announces new startup policy"),
        ],
    ));
    let mut clients = HashMap::new();
    clients.insert("static".to_string(), client);
    let cache = Arc::new(ArticleCache::new(
        CachePolicy::new(CacheConfig::default(), clock.clone()),
        Arc::new(InMemoryCacheStore::new(clock.clone())),
    ));
    let cfg = OrchestratorConfig {
        categories: vec!["general".into(), "technology".into()],
        ..OrchestratorConfig::default()
    };
    let orch = IngestionOrchestrator::new(
        allocator,
        clients,
        Arc::new(InMemoryArticleStore::new()),
        cache,
        Deduplicator::default(),
        cfg,
    );
    api::router(Arc::new(orch))
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();
    let (status, bytes) = call(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "OK");
}

#[tokio::test]
async fn api_ingest_category_returns_report_then_articles_are_served() {
    let app = test_router();

    let (status, bytes) = call(&app, "POST", "/ingest/general").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).expect("report json");
    assert_eq!(v["category"], "general");
    assert_eq!(v["outcome"]["kind"], "completed");
    assert_eq!(v["kept"], 2);
    assert_eq!(v["cache_refreshed"], true);

    let (status, bytes) = call(&app, "GET", "/articles/general?page=1&limit=20").await;
    assert_eq!(status, StatusCode::OK);
    let rows: Json = serde_json::from_slice(&bytes).expect("articles json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["category"] == "general"));

    let (_, bytes) = call(&app, "GET", "/cache/stats").await;
    let stats: Json = serde_json::from_slice(&bytes).expect("stats json");
    assert_eq!(stats["hits"], 1);

    let (_, bytes) = call(&app, "GET", "/quota").await;
    let q: Json = serde_json::from_slice(&bytes).expect("quota json");
    assert_eq!(q["static"]["used_today"], 1);
    assert_eq!(q["static"]["reserved"], 0);
}

#[tokio::test]
async fn api_articles_defaults_page_and_limit() {
    let app = test_router();
    let (status, bytes) = call(&app, "GET", "/articles/sports").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"[]");
}

#[tokio::test]
async fn api_full_refresh_returns_sorted_reports() {
    let app = test_router();
    let (status, bytes) = call(&app, "POST", "/ingest").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).expect("reports json");
    let cats: Vec<&str> = v
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|r| r["category"].as_str())
        .collect();
    assert_eq!(cats, ["general", "technology"]);
}
