// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::normalize::normalize_url;

/// Article as produced by a provider adapter, before dedup and persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawArticle {
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub body: String,
    /// Canonical URL as given by the provider.
    pub url: String,
    pub source_name: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category_hint: Option<String>,
}

impl RawArticle {
    /// Upsert key: provider id when present, otherwise the normalized URL.
    pub fn storage_key(&self) -> String {
        match self.external_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => normalize_url(&self.url),
        }
    }

    /// Text fed into the content hash; falls back to the description when
    /// the provider ships no body.
    pub fn hash_body(&self) -> &str {
        if self.body.trim().is_empty() {
            &self.description
        } else {
            &self.body
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Indian,
    International,
    Unknown,
}

/// Article with derived fields, as handed to the persistent store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub key: String,
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
    pub body: String,
    /// Normalized canonical URL.
    pub url: String,
    pub source_name: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: String,
    pub provider: String,
    pub content_hash: String,
    pub word_count: usize,
    pub reading_time_minutes: u32,
    pub relevance_score: f32,
    pub content_origin: ContentOrigin,
    pub fetched_at: DateTime<Utc>,
}

/// What one provider call returned and how many requests it spent.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub articles: Vec<RawArticle>,
    pub requests_made: u32,
}

/// One upstream provider. The orchestrator never knows which API sits behind it.
#[async_trait::async_trait]
pub trait SourceClient: Send + Sync {
    fn id(&self) -> &str;

    /// Fetch articles for `category` using at most `budget` requests.
    async fn fetch(&self, category: &str, budget: u32) -> Result<SourceBatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: Option<&str>, url: &str) -> RawArticle {
        RawArticle {
            external_id: id.map(String::from),
            title: "t".into(),
            description: "d".into(),
            body: String::new(),
            url: url.into(),
            source_name: "s".into(),
            author: None,
            published_at: None,
            category_hint: None,
        }
    }

    #[test]
    fn storage_key_prefers_external_id() {
        assert_eq!(raw(Some("abc"), "https://x.in/1").storage_key(), "abc");
        assert_eq!(
            raw(Some("  "), "http://www.x.in/1/").storage_key(),
            "https://x.in/1"
        );
    }

    #[test]
    fn empty_body_hashes_description() {
        assert_eq!(raw(None, "u").hash_body(), "d");
    }
}
