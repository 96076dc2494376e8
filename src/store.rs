// src/store.rs
//! Persistent article store collaborator.
//!
//! The relational store itself lives outside this crate; the core only needs
//! idempotent upserts, a recent-window snapshot for dedup, and a URL probe.
//! `InMemoryArticleStore` backs tests and the standalone service.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use crate::dedup::normalize::normalize_url;
use crate::ingest::types::Article;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert new rows and refresh mutable fields of existing ones, keyed by
    /// `Article::key`. Re-running the same batch never adds rows.
    async fn upsert_articles(&self, batch: &[Article]) -> Result<UpsertSummary>;

    /// Articles of `category` published (or fetched, when the provider gave no
    /// timestamp) at or after `since`, newest first.
    async fn find_recent_by_window(&self, category: &str, since: DateTime<Utc>) -> Result<Vec<Article>>;

    async fn article_exists_by_url(&self, url: &str) -> Result<bool>;
}

fn effective_time(a: &Article) -> DateTime<Utc> {
    a.published_at.unwrap_or(a.fetched_at)
}

#[derive(Debug, Default)]
pub struct InMemoryArticleStore {
    rows: RwLock<HashMap<String, Article>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<Article> {
        self.rows.read().get(key).cloned()
    }

    /// Seed rows directly, bypassing upsert bookkeeping.
    pub fn seed<I: IntoIterator<Item = Article>>(&self, articles: I) {
        let mut g = self.rows.write();
        for a in articles {
            g.insert(a.key.clone(), a);
        }
    }
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn upsert_articles(&self, batch: &[Article]) -> Result<UpsertSummary> {
        let mut g = self.rows.write();
        let mut summary = UpsertSummary::default();
        for a in batch {
            match g.get_mut(&a.key) {
                Some(row) => {
                    row.title = a.title.clone();
                    row.description = a.description.clone();
                    row.relevance_score = a.relevance_score;
                    row.word_count = a.word_count;
                    row.reading_time_minutes = a.reading_time_minutes;
                    row.content_origin = a.content_origin;
                    row.fetched_at = a.fetched_at;
                    summary.updated += 1;
                }
                None => {
                    g.insert(a.key.clone(), a.clone());
                    summary.inserted += 1;
                }
            }
        }
        Ok(summary)
    }

    async fn find_recent_by_window(&self, category: &str, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let g = self.rows.read();
        let mut out: Vec<Article> = g
            .values()
            .filter(|a| a.category.eq_ignore_ascii_case(category) && effective_time(a) >= since)
            .cloned()
            .collect();
        out.sort_by(|a, b| effective_time(b).cmp(&effective_time(a)).then_with(|| a.key.cmp(&b.key)));
        Ok(out)
    }

    async fn article_exists_by_url(&self, url: &str) -> Result<bool> {
        let u = normalize_url(url);
        Ok(self.rows.read().values().any(|a| a.url == u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::ContentOrigin;
    use chrono::{Duration, TimeZone};

    fn article(key: &str, url: &str, title: &str, hours_ago: i64) -> Article {
        let now = Utc.with_ymd_and_hms(2025, 6, 9, 6, 0, 0).unwrap();
        Article {
            key: key.into(),
            external_id: Some(key.into()),
            title: title.into(),
            description: String::new(),
            body: String::new(),
            url: url.into(),
            source_name: "The Hindu".into(),
            author: None,
            published_at: Some(now - Duration::hours(hours_ago)),
            category: "general".into(),
            provider: "newsapi".into(),
            content_hash: String::new(),
            word_count: 0,
            reading_time_minutes: 1,
            relevance_score: 0.5,
            content_origin: ContentOrigin::Indian,
            fetched_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_updates_title() {
        let s = InMemoryArticleStore::new();
        let a = article("x1", "https://thehindu.com/a", "Old", 1);
        let first = s.upsert_articles(&[a.clone()]).await.unwrap();
        assert_eq!(first, UpsertSummary { inserted: 1, updated: 0 });

        let mut b = a.clone();
        b.title = "New".into();
        let second = s.upsert_articles(&[b]).await.unwrap();
        assert_eq!(second, UpsertSummary { inserted: 0, updated: 1 });
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("x1").unwrap().title, "New");
    }

    #[tokio::test]
    async fn recent_window_filters_and_orders() {
        let s = InMemoryArticleStore::new();
        s.seed([
            article("a", "https://x.in/a", "A", 2),
            article("b", "https://x.in/b", "B", 1),
            article("c", "https://x.in/c", "C", 100),
        ]);
        let since = Utc.with_ymd_and_hms(2025, 6, 7, 6, 0, 0).unwrap();
        let got = s.find_recent_by_window("General", since).await.unwrap();
        let keys: Vec<_> = got.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert!(s.article_exists_by_url("http://www.x.in/c/").await.unwrap());
        assert!(!s.article_exists_by_url("https://x.in/zzz").await.unwrap());
    }
}
