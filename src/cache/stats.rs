// src/cache/stats.rs
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    hits: u64,
    misses: u64,
}

/// Read-path hit/miss counters, overall and per category.
#[derive(Debug, Default)]
pub struct CacheStats {
    inner: Mutex<BTreeMap<String, Counts>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Configured monitoring target, if the category has one.
    pub target_hit_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub per_category: BTreeMap<String, CategoryStats>,
}

fn rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

impl CacheStats {
    pub fn record(&self, category: &str, hit: bool) {
        let mut g = self.inner.lock();
        let c = g.entry(category.to_string()).or_default();
        if hit {
            c.hits += 1;
        } else {
            c.misses += 1;
        }
    }

    pub fn snapshot<F>(&self, target_for: F) -> CacheStatsSnapshot
    where
        F: Fn(&str) -> Option<f64>,
    {
        let g = self.inner.lock();
        let (mut hits, mut misses) = (0, 0);
        let per_category = g
            .iter()
            .map(|(cat, c)| {
                hits += c.hits;
                misses += c.misses;
                (
                    cat.clone(),
                    CategoryStats {
                        hits: c.hits,
                        misses: c.misses,
                        hit_rate: rate(c.hits, c.misses),
                        target_hit_rate: target_for(cat),
                    },
                )
            })
            .collect();
        CacheStatsSnapshot {
            hits,
            misses,
            hit_rate: rate(hits, misses),
            per_category,
        }
    }
}
