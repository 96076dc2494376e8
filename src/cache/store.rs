// src/cache/store.rs
//! Cache store collaborator and an in-process implementation.
//!
//! The store owns entries and their expiry; the policy only supplies keys
//! and TTLs. Expiry is absolute (no sliding refresh on access).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::policy::category_of_key;
use crate::clock::Clock;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, payload: String, ttl: Duration) -> Result<()>;
    /// Drop every key matching `pattern` (exact, or prefix when it ends in `*`).
    /// Returns the number of removed entries.
    async fn invalidate(&self, pattern: &str) -> Result<usize>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub category: String,
    pub ttl_secs: u64,
    pub created_at: DateTime<FixedOffset>,
    pub expires_at: DateTime<FixedOffset>,
    pub access_count: u64,
    #[serde(skip)]
    pub payload: String,
}

pub fn matches_pattern(key: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Entry metadata, including expired entries not yet evicted.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut g = self.entries.lock();
        let before = g.len();
        g.retain(|_, e| e.expires_at > now);
        before - g.len()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut g = self.entries.lock();
        let expired = match g.get_mut(key) {
            None => return Ok(None),
            Some(e) if e.expires_at > now => {
                e.access_count += 1;
                return Ok(Some(e.payload.clone()));
            }
            Some(_) => true,
        };
        if expired {
            g.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let ttl_chrono = chrono::Duration::from_std(ttl)?;
        let entry = CacheEntry {
            key: key.to_string(),
            category: category_of_key(key).unwrap_or_default().to_string(),
            ttl_secs: ttl.as_secs(),
            created_at: now,
            expires_at: now + ttl_chrono,
            access_count: 0,
            payload,
        };
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let mut g = self.entries.lock();
        let before = g.len();
        g.retain(|k, _| !matches_pattern(k, pattern));
        Ok(before - g.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn entries_expire_absolutely() {
        let clock = Arc::new(ManualClock::ist(2025, 6, 9, 12, 0).unwrap());
        let store = InMemoryCacheStore::new(clock.clone());
        store
            .set("articles:sports:p1:l20", "[]".into(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("articles:sports:p1:l20").await.unwrap().as_deref(), Some("[]"));
        let e = store.entry("articles:sports:p1:l20").unwrap();
        assert_eq!(e.category, "sports");
        assert_eq!(e.access_count, 1);
        assert_eq!(e.ttl_secs, 60);

        clock.advance(chrono::Duration::seconds(61));
        assert!(store.get("articles:sports:p1:l20").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn invalidate_by_prefix_pattern() {
        let clock = Arc::new(ManualClock::ist(2025, 6, 9, 12, 0).unwrap());
        let store = InMemoryCacheStore::new(clock);
        for k in ["articles:sports:p1:l20", "articles:sports:p2:l20", "articles:business:p1:l20"] {
            store.set(k, "x".into(), Duration::from_secs(600)).await.unwrap();
        }
        assert_eq!(store.invalidate("articles:sports:*").await.unwrap(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.invalidate("articles:business:p1:l20").await.unwrap(), 1);
    }

    #[test]
    fn evict_expired_counts() {
        let clock = Arc::new(ManualClock::ist(2025, 6, 9, 12, 0).unwrap());
        let store = InMemoryCacheStore::new(clock.clone());
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(store.set("a:b:p1:l1", "x".into(), Duration::from_secs(5)))
            .unwrap();
        clock.advance(chrono::Duration::seconds(10));
        assert_eq!(store.evict_expired(), 1);
    }
}
