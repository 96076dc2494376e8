//! News ingestion service: binary entrypoint.
//! Loads config, wires allocator/stores/cache/providers into the orchestrator,
//! starts the refresh and quota-reset schedulers, and serves the admin router.

use std::sync::Arc;
use std::time::Duration;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_ingest_core::cache::{ArticleCache, CachePolicy, InMemoryCacheStore};
use news_ingest_core::clock::{offset_from_minutes, Clock, SystemClock};
use news_ingest_core::config;
use news_ingest_core::ingest::providers::build_clients;
use news_ingest_core::ingest::scheduler::{spawn_refresh_scheduler, spawn_reset_tick};
use news_ingest_core::ingest::IngestionOrchestrator;
use news_ingest_core::metrics::Metrics;
use news_ingest_core::quota::QuotaAllocator;
use news_ingest_core::store::InMemoryArticleStore;

/// Compact tracing logs. `RUST_LOG` wins over the built-in filter.
fn enable_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_ingest_core=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_tracing();

    let metrics = Metrics::init()?;
    let cfg = config::load_default()?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(offset_from_minutes(cfg.utc_offset_minutes)));
    let allocator = Arc::new(QuotaAllocator::from_config(&cfg, clock.clone()));
    if let Some(path) = &cfg.orchestrator.ledger_path {
        if let Err(e) = allocator.restore_ledger(path) {
            tracing::warn!(target: "quota", error = ?e, "quota ledger not restored");
        }
    }

    let store = Arc::new(InMemoryArticleStore::new());
    let cache = Arc::new(ArticleCache::new(
        CachePolicy::new(cfg.cache.clone(), clock.clone()),
        Arc::new(InMemoryCacheStore::new(clock.clone())),
    ));
    let clients = build_clients(&cfg.providers);

    let orchestrator = Arc::new(IngestionOrchestrator::from_config(
        &cfg,
        allocator.clone(),
        clients,
        store,
        cache,
    ));

    spawn_reset_tick(
        allocator,
        Duration::from_secs(cfg.orchestrator.reset_tick_secs),
        cfg.orchestrator.ledger_path.clone(),
    );
    spawn_refresh_scheduler(
        orchestrator.clone(),
        Duration::from_secs(cfg.orchestrator.refresh_interval_secs),
    );

    let router = news_ingest_core::router(orchestrator).merge(metrics.router());
    Ok(router.into())
}
