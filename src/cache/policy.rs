// src/cache/policy.rs
//! Cache keys and time-dependent TTLs. Holds no cache state.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::form_urlencoded;

use super::config::{CacheConfig, TtlRule};
use crate::clock::Clock;

pub const ARTICLES_CONTENT_TYPE: &str = "articles";

/// Which of the configured TTLs was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlWindow {
    Peak,
    OffPeak,
    Event,
    FallbackBusiness,
    FallbackOffHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TtlDecision {
    #[serde(with = "secs")]
    pub ttl: Duration,
    pub window: TtlWindow,
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

/// Logical cache request. Filters live in a sorted map so insertion order
/// never reaches the key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheRequest {
    pub content_type: String,
    pub category: String,
    pub page: u32,
    pub limit: u32,
    pub filters: BTreeMap<String, String>,
}

impl CacheRequest {
    pub fn articles(category: &str, page: u32, limit: u32) -> Self {
        Self {
            content_type: ARTICLES_CONTENT_TYPE.to_string(),
            category: category.to_string(),
            page,
            limit,
            filters: BTreeMap::new(),
        }
    }

    pub fn with_filter(mut self, k: &str, v: &str) -> Self {
        self.filters.insert(k.to_string(), v.to_string());
        self
    }

    pub fn key(&self) -> String {
        cache_key(
            &self.content_type,
            &self.category,
            self.page,
            self.limit,
            self.filters.iter(),
        )
    }
}

fn canon(s: &str) -> String {
    encode(&s.trim().to_ascii_lowercase())
}

/// Percent-encode one key segment so `:`, `&` and `=` only ever act as
/// separators.
fn encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Deterministic key: `type:category:p{page}:l{limit}[:k=v&k=v]`, filters
/// sorted by key then value. Every segment, filter key and filter value is
/// percent-encoded.
pub fn cache_key<I, K, V>(content_type: &str, category: &str, page: u32, limit: u32, filters: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut pairs: Vec<(String, String)> = filters
        .into_iter()
        .map(|(k, v)| (canon(k.as_ref()), encode(v.as_ref().trim())))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    pairs.sort();
    let mut key = format!(
        "{}:{}:p{}:l{}",
        canon(content_type),
        canon(category),
        page,
        limit
    );
    if !pairs.is_empty() {
        let rendered = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        key.push(':');
        key.push_str(&rendered);
    }
    key
}

/// Pattern covering every key of one category.
pub fn category_pattern(content_type: &str, category: &str) -> String {
    format!("{}:{}:*", canon(content_type), canon(category))
}

/// Category segment of a key built by `cache_key`.
pub fn category_of_key(key: &str) -> Option<&str> {
    key.split(':').nth(1).filter(|s| !s.is_empty())
}

pub struct CachePolicy {
    cfg: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl CachePolicy {
    pub fn new(cfg: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        for (name, w) in [
            ("business_hours", &cfg.business_hours),
            ("market_hours", &cfg.market_hours),
            ("live_event_hours", &cfg.live_event_hours),
        ] {
            if !w.is_valid() {
                tracing::warn!(target: "cache", window = name, "malformed time window, it will never match");
            }
        }
        Self { cfg, clock }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.cfg
    }

    pub fn key(&self, req: &CacheRequest) -> String {
        req.key()
    }

    /// TTL for `category` right now.
    pub fn ttl_for(&self, category: &str) -> TtlDecision {
        self.ttl_at(category, self.clock.now())
    }

    pub fn ttl_at(&self, category: &str, now: DateTime<FixedOffset>) -> TtlDecision {
        let business = self.cfg.business_hours.contains(now);
        let Some(c) = self.cfg.category(category) else {
            return if business {
                TtlDecision {
                    ttl: Duration::from_secs(self.cfg.fallback_business_secs),
                    window: TtlWindow::FallbackBusiness,
                }
            } else {
                TtlDecision {
                    ttl: Duration::from_secs(self.cfg.fallback_off_hours_secs),
                    window: TtlWindow::FallbackOffHours,
                }
            };
        };

        let (ttl, window) = match c.rule {
            TtlRule::Breaking => (c.event(), TtlWindow::Event),
            TtlRule::LiveEvent => {
                if self.cfg.live_event_hours.contains(now) {
                    (c.event(), TtlWindow::Event)
                } else {
                    (c.peak(), TtlWindow::Peak)
                }
            }
            TtlRule::Market => {
                if self.cfg.market_hours.contains(now) {
                    (c.event(), TtlWindow::Event)
                } else {
                    (c.off_peak(), TtlWindow::OffPeak)
                }
            }
            TtlRule::Standard => {
                if business {
                    (c.peak(), TtlWindow::Peak)
                } else {
                    (c.off_peak(), TtlWindow::OffPeak)
                }
            }
        };
        TtlDecision { ttl, window }
    }

    pub fn target_hit_rate(&self, category: &str) -> Option<f64> {
        self.cfg.category(category).map(|c| c.target_hit_rate)
    }
}
