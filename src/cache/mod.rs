// src/cache/mod.rs
//! Time-aware article cache: key/TTL policy, store collaborator, read stats.
//!
//! `ArticleCache` is the only path the orchestrator and readers use to touch
//! the store. Store failures are logged and counted, never propagated as
//! ingestion errors; a failed read is a miss.

pub mod config;
pub mod policy;
pub mod stats;
pub mod store;

use anyhow::{Context, Result};
use metrics::counter;
use std::sync::Arc;

pub use config::{CacheConfig, CategoryTtl, TimeWindow, TtlRule};
pub use policy::{
    cache_key, category_pattern, CachePolicy, CacheRequest, TtlDecision, TtlWindow,
    ARTICLES_CONTENT_TYPE,
};
pub use stats::{CacheStats, CacheStatsSnapshot, CategoryStats};
pub use store::{CacheEntry, CacheStore, InMemoryCacheStore};

pub struct ArticleCache {
    policy: CachePolicy,
    store: Arc<dyn CacheStore>,
    stats: CacheStats,
}

impl ArticleCache {
    pub fn new(policy: CachePolicy, store: Arc<dyn CacheStore>) -> Self {
        Self {
            policy,
            store,
            stats: CacheStats::default(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Read path: returns the cached payload and records a hit or a miss.
    pub async fn get_articles(&self, req: &CacheRequest) -> Option<String> {
        let key = req.key();
        let category = req.category.trim().to_ascii_lowercase();
        let found = match self.store.get(&key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "cache", error = ?e, %key, "cache get failed");
                counter!("cache_store_errors_total").increment(1);
                None
            }
        };
        self.stats.record(&category, found.is_some());
        if found.is_some() {
            counter!("cache_hits_total", "category" => category).increment(1);
        } else {
            counter!("cache_misses_total", "category" => category).increment(1);
        }
        found
    }

    /// Write `payload` under the request's key with the TTL the policy picks now.
    pub async fn put(&self, req: &CacheRequest, payload: String) -> Result<TtlDecision> {
        let key = req.key();
        let decision = self.policy.ttl_for(&req.category);
        self.store
            .set(&key, payload, decision.ttl)
            .await
            .with_context(|| format!("cache set {key}"))?;
        tracing::debug!(
            target: "cache",
            %key,
            ttl_secs = decision.ttl.as_secs(),
            window = ?decision.window,
            "cache entry written"
        );
        Ok(decision)
    }

    /// Drop every cached page of one category.
    pub async fn invalidate_category(&self, content_type: &str, category: &str) -> Result<usize> {
        let pattern = category_pattern(content_type, category);
        self.store
            .invalidate(&pattern)
            .await
            .with_context(|| format!("cache invalidate {pattern}"))
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats
            .snapshot(|category| self.policy.target_hit_rate(category))
    }
}
