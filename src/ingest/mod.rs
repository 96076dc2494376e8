// src/ingest/mod.rs
//! Ingestion orchestrator: one pass per category.
//!
//! A pass runs strictly in order: advisory budget check, lease from the
//! allocator, bounded fetch, dedup against the pre-pass snapshot, enrichment,
//! upsert, cache refresh, and finally settling the lease. The lease is settled
//! on every path that acquired one, so quota usage is recorded whether or not
//! the later steps succeed. A pass whose future is dropped mid-flight gives
//! its reservation back when the lease drops.

pub mod enrich;
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ArticleCache, CacheRequest, CacheStatsSnapshot};
use crate::config::{IngestConfig, OrchestratorConfig};
use crate::dedup::{DedupIndex, Deduplicator, DuplicateVerdict};
use crate::error::{IngestError, Result};
use crate::quota::{Lease, ProviderQuota, QuotaAllocator};
use crate::store::ArticleStore;

use self::enrich::Enricher;
use self::types::{Article, RawArticle, SourceClient};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_passes_total", "Ingestion passes by category and outcome.");
        describe_counter!("ingest_fetched_total", "Articles returned by providers.");
        describe_counter!("ingest_kept_total", "Articles kept after deduplication.");
        describe_counter!("ingest_dedup_total", "Articles dropped as duplicates, by method.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors and timeouts."
        );
        describe_histogram!("ingest_fetch_ms", "Provider fetch+parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when an ingestion pass last completed."
        );
        describe_gauge!("quota_used_today", "Requests used today per source.");
        describe_gauge!("quota_used_hour", "Requests used this hour per source.");
        describe_counter!("cache_hits_total", "Cache read hits by category.");
        describe_counter!("cache_misses_total", "Cache read misses by category.");
        describe_counter!("cache_store_errors_total", "Cache store failures (swallowed).");
    });
}

/// How a pass ended. Everything except a persistence failure is a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed,
    /// Every source is inactive, unsuitable or out of quota.
    NoSourceAvailable,
    /// The advisory hourly budget is already spent.
    HourlyBudgetReached,
    /// Network/parse failure or timeout on the allocated source.
    SourceFailed { source: String, error: String },
}

impl PassOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PassOutcome::Completed => "completed",
            PassOutcome::NoSourceAvailable => "no_source",
            PassOutcome::HourlyBudgetReached => "budget_reached",
            PassOutcome::SourceFailed { .. } => "source_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub category: String,
    pub source: Option<String>,
    /// Requests granted by the allocator for this pass.
    pub granted: u32,
    pub fetched: usize,
    pub kept: usize,
    pub inserted: usize,
    pub updated: usize,
    pub duplicates: Vec<DuplicateVerdict>,
    pub cache_refreshed: bool,
    pub outcome: PassOutcome,
}

impl PassReport {
    fn empty(category: &str, outcome: PassOutcome) -> Self {
        Self {
            category: category.to_string(),
            source: None,
            granted: 0,
            fetched: 0,
            kept: 0,
            inserted: 0,
            updated: 0,
            duplicates: Vec::new(),
            cache_refreshed: false,
            outcome,
        }
    }
}

pub struct IngestionOrchestrator {
    allocator: Arc<QuotaAllocator>,
    clients: HashMap<String, Arc<dyn SourceClient>>,
    store: Arc<dyn ArticleStore>,
    cache: Arc<ArticleCache>,
    dedup: Deduplicator,
    enricher: Enricher,
    cfg: OrchestratorConfig,
}

impl IngestionOrchestrator {
    /// Sources without a client are deactivated so the allocator never
    /// grants them budget.
    pub fn new(
        allocator: Arc<QuotaAllocator>,
        clients: HashMap<String, Arc<dyn SourceClient>>,
        store: Arc<dyn ArticleStore>,
        cache: Arc<ArticleCache>,
        dedup: Deduplicator,
        cfg: OrchestratorConfig,
    ) -> Self {
        for source in allocator.snapshot().keys() {
            if !clients.contains_key(source) {
                tracing::warn!(target: "ingest", %source, "no client for source, deactivated");
                allocator.set_active(source, false);
            }
        }
        ensure_metrics_described();
        Self {
            allocator,
            clients,
            store,
            cache,
            dedup,
            enricher: Enricher::default(),
            cfg,
        }
    }

    /// Wire everything from a loaded config.
    pub fn from_config(
        cfg: &IngestConfig,
        allocator: Arc<QuotaAllocator>,
        clients: HashMap<String, Arc<dyn SourceClient>>,
        store: Arc<dyn ArticleStore>,
        cache: Arc<ArticleCache>,
    ) -> Self {
        let offset = crate::clock::offset_from_minutes(cfg.utc_offset_minutes);
        Self::new(
            allocator,
            clients,
            store,
            cache,
            Deduplicator::new(cfg.dedup.clone(), offset),
            cfg.orchestrator.clone(),
        )
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn allocator(&self) -> &Arc<QuotaAllocator> {
        &self.allocator
    }

    pub fn cache(&self) -> &Arc<ArticleCache> {
        &self.cache
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.cfg
    }

    pub fn quota_snapshot(&self) -> BTreeMap<String, ProviderQuota> {
        self.allocator.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Run one pass for `category`. Only persistence failures are errors.
    pub async fn trigger_ingestion(&self, category: &str) -> Result<PassReport> {
        let category = category.trim().to_ascii_lowercase();
        let result = self.run_pass(&category).await;
        let label = match &result {
            Ok(r) => r.outcome.label(),
            Err(_) => "persistence_failed",
        };
        counter!("ingest_passes_total", "category" => category.clone(), "outcome" => label)
            .increment(1);
        result
    }

    async fn run_pass(&self, category: &str) -> Result<PassReport> {
        let advisory = self.allocator.current_hourly_budget();
        let spent = self.allocator.requests_this_hour();
        if spent >= advisory {
            tracing::info!(target: "ingest", category, budget = advisory, spent, "hourly budget reached, pass skipped");
            return Ok(PassReport::empty(category, PassOutcome::HourlyBudgetReached));
        }
        let cap = self.cfg.max_requests_per_pass.min(advisory - spent);

        let lease = match self.allocator.allocate(category, cap) {
            Ok(l) => l,
            Err(_) => {
                tracing::info!(target: "ingest", category, "no source available, pass skipped");
                return Ok(PassReport::empty(category, PassOutcome::NoSourceAvailable));
            }
        };
        let source = lease.source().to_string();
        let granted = lease.granted();

        let Some(client) = self.clients.get(&source).cloned() else {
            let error = "no client registered".to_string();
            self.allocator.settle(lease, 0, false, Some(error.clone()));
            return Ok(PassReport::empty(category, PassOutcome::SourceFailed { source, error }));
        };

        let timeout = Duration::from_secs(self.cfg.fetch_timeout_secs);
        let fetched = match tokio::time::timeout(timeout, client.fetch(category, granted)).await {
            Ok(Ok(batch)) => Ok(batch),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
        };
        let batch = match fetched {
            Ok(b) => b,
            Err(error) => {
                tracing::warn!(target: "ingest", category, source = %source, %error, "provider call failed");
                counter!("ingest_provider_errors_total", "source" => source.clone()).increment(1);
                self.allocator.settle(lease, 1, false, Some(error.clone()));
                let mut report =
                    PassReport::empty(category, PassOutcome::SourceFailed { source: source.clone(), error });
                report.source = Some(source);
                report.granted = granted;
                return Ok(report);
            }
        };

        let used = batch.requests_made.max(1);
        let result = self.process_batch(category, &source, batch.articles).await;
        self.settle(lease, used);

        let mut report = result?;
        report.granted = granted;
        gauge!("ingest_pipeline_last_run_ts").set(Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            category,
            source = %source,
            fetched = report.fetched,
            kept = report.kept,
            dedup = report.duplicates.len(),
            cache = report.cache_refreshed,
            "pass completed"
        );
        Ok(report)
    }

    fn settle(&self, lease: Lease, used: u32) {
        self.allocator.settle(lease, used, true, None);
    }

    /// Dedup, enrich, persist, refresh cache.
    async fn process_batch(&self, category: &str, source: &str, raw: Vec<RawArticle>) -> Result<PassReport> {
        let now = self.allocator.clock().now().with_timezone(&Utc);
        let since = now - ChronoDuration::hours(self.cfg.recent_window_hours);
        let persistence = |e: anyhow::Error| IngestError::Persistence {
            category: category.to_string(),
            source: e,
        };

        let existing = self
            .store
            .find_recent_by_window(category, since)
            .await
            .map_err(persistence)?;
        let mut index = DedupIndex::from_snapshot(existing.iter());
        for a in &raw {
            if !index.contains_url(&a.url) && self.store.article_exists_by_url(&a.url).await.map_err(persistence)? {
                index.add_known_url(&a.url);
            }
        }

        let fetched = raw.len();
        let (keep, duplicates) = self.dedup.partition(raw, &mut index);
        for v in &duplicates {
            counter!("ingest_dedup_total", "method" => v.method.label()).increment(1);
        }

        let articles: Vec<Article> = keep
            .into_iter()
            .map(|(raw, fp)| self.enricher.enrich(raw, &fp, category, source, now))
            .collect();
        counter!("ingest_kept_total").increment(articles.len() as u64);

        let summary = if articles.is_empty() {
            Default::default()
        } else {
            self.store.upsert_articles(&articles).await.map_err(|e| {
                tracing::warn!(target: "ingest", category, error = ?e, "persistence failed");
                persistence(e)
            })?
        };

        // Only after the write above has committed.
        let cache_refreshed = self.refresh_cache(category, since).await;

        Ok(PassReport {
            category: category.to_string(),
            source: Some(source.to_string()),
            granted: 0,
            fetched,
            kept: articles.len(),
            inserted: summary.inserted,
            updated: summary.updated,
            duplicates,
            cache_refreshed,
            outcome: PassOutcome::Completed,
        })
    }

    /// Invalidate the category's pages and pre-populate page 1.
    /// Failures are logged and counted, never surfaced.
    async fn refresh_cache(&self, category: &str, since: chrono::DateTime<Utc>) -> bool {
        match self.try_refresh_cache(category, since).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(target: "cache", category, error = ?e, "cache refresh failed");
                counter!("cache_store_errors_total").increment(1);
                false
            }
        }
    }

    async fn try_refresh_cache(&self, category: &str, since: chrono::DateTime<Utc>) -> anyhow::Result<()> {
        let limit = self.cfg.cache_page_size;
        self.cache
            .invalidate_category(crate::cache::ARTICLES_CONTENT_TYPE, category)
            .await?;
        let mut fresh = self.store.find_recent_by_window(category, since).await?;
        fresh.truncate(limit);
        let payload = serde_json::to_string(&fresh)?;
        let req = CacheRequest::articles(category, 1, limit as u32);
        self.cache.put(&req, payload).await?;
        Ok(())
    }

    /// Read-through page of a category's articles as JSON. A miss is filled
    /// from the store and cached; any failure serves an empty list.
    pub async fn articles_page(&self, category: &str, page: u32, limit: u32) -> String {
        let category = category.trim().to_ascii_lowercase();
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let req = CacheRequest::articles(&category, page, limit);
        if let Some(hit) = self.cache.get_articles(&req).await {
            return hit;
        }
        let since = self.allocator.clock().now().with_timezone(&Utc)
            - ChronoDuration::hours(self.cfg.recent_window_hours);
        let rows = match self.store.find_recent_by_window(&category, since).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(target: "cache", category = %category, error = ?e, "store read failed on cache miss");
                return "[]".to_string();
            }
        };
        let start = (page - 1).saturating_mul(limit) as usize;
        let slice: Vec<&Article> = rows.iter().skip(start).take(limit as usize).collect();
        let payload = match serde_json::to_string(&slice) {
            Ok(p) => p,
            Err(_) => return "[]".to_string(),
        };
        if let Err(e) = self.cache.put(&req, payload.clone()).await {
            tracing::warn!(target: "cache", category = %category, error = ?e, "cache fill failed");
            counter!("cache_store_errors_total").increment(1);
        }
        payload
    }

    /// One pass per configured category, at most `max_concurrent_passes` at
    /// a time. Reports come back sorted by category.
    pub async fn trigger_full_refresh(&self) -> Result<Vec<PassReport>> {
        let categories = self.cfg.categories.clone();
        let results: Vec<(String, Result<PassReport>)> = stream::iter(categories)
            .map(|c| async move {
                let r = self.trigger_ingestion(&c).await;
                (c, r)
            })
            .buffer_unordered(self.cfg.max_concurrent_passes.max(1))
            .collect()
            .await;

        let mut reports = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        for (category, r) in results {
            match r {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!(target: "ingest", %category, error = %e, "pass failed during full refresh");
                    failed.push(category);
                }
            }
        }
        reports.sort_by(|a, b| a.category.cmp(&b.category));
        if failed.is_empty() {
            Ok(reports)
        } else {
            failed.sort();
            Err(IngestError::Refresh { failed })
        }
    }
}
