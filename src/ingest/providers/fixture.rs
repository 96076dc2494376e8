// src/ingest/providers/fixture.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::ingest::types::{RawArticle, SourceBatch, SourceClient};

/// In-process source serving a fixed article list. Used by tests and for
/// replaying captured batches.
pub struct StaticSourceClient {
    id: String,
    articles: Mutex<Vec<RawArticle>>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicU32,
}

impl StaticSourceClient {
    pub fn new(id: &str, articles: Vec<RawArticle>) -> Self {
        Self {
            id: id.to_string(),
            articles: Mutex::new(articles),
            failure: None,
            delay: None,
            calls: AtomicU32::new(0),
        }
    }

    /// A source whose every call fails with `message`.
    pub fn failing(id: &str, message: &str) -> Self {
        let mut c = Self::new(id, Vec::new());
        c.failure = Some(message.to_string());
        c
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_articles(&self, articles: Vec<RawArticle>) {
        *self.articles.lock() = articles;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceClient for StaticSourceClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, category: &str, budget: u32) -> Result<SourceBatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if budget == 0 {
            return Ok(SourceBatch::default());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        if let Some(msg) = &self.failure {
            bail!("{}: {msg}", self.id);
        }
        let articles = self
            .articles
            .lock()
            .iter()
            .cloned()
            .map(|mut a| {
                a.category_hint.get_or_insert_with(|| category.to_string());
                a
            })
            .collect();
        Ok(SourceBatch {
            articles,
            requests_made: 1,
        })
    }
}
