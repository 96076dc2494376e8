// src/ingest/providers/json_api.rs
//! NewsAPI / GNews / NewsData style JSON endpoints.
//!
//! NewsAPI and GNews return `{"articles": [...]}` and page with an integer
//! `page`; NewsData returns `{"results": [...], "nextPage": "<token>"}`.
//! One page is one request; paging stops at the granted budget, an empty or
//! short page, or a missing next-page token.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

use super::{normalize_text, parse_api_timestamp, upstream_category};
use crate::config::ProviderConfig;
use crate::ingest::types::{RawArticle, SourceBatch, SourceClient};

#[derive(Debug, Deserialize)]
struct NamedSource {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticleItem {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    author: Option<String>,
    published_at: Option<String>,
    source: Option<NamedSource>,
}

#[derive(Debug, Deserialize)]
struct ResultItem {
    article_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    link: Option<String>,
    #[serde(default)]
    creator: Option<Vec<String>>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source_name: Option<String>,
    source_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResponse {
    Articles {
        articles: Vec<ArticleItem>,
    },
    Results {
        results: Vec<ResultItem>,
        #[serde(rename = "nextPage", default)]
        next_page: Option<String>,
    },
    Failure {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// One parsed response page.
#[derive(Debug, Default)]
pub struct Page {
    pub articles: Vec<RawArticle>,
    /// Cursor for the following page, if the API uses tokens.
    pub next_token: Option<String>,
    pub token_paged: bool,
}

fn clean(s: Option<String>) -> String {
    s.as_deref().map(normalize_text).unwrap_or_default()
}

/// Parse one response body. Items without a title or URL are dropped.
pub fn parse_page(body: &str, provider: &str, category: &str) -> Result<Page> {
    let resp: ApiResponse =
        serde_json::from_str(body).with_context(|| format!("parsing {provider} response"))?;
    let mut page = Page::default();
    match resp {
        ApiResponse::Articles { articles } => {
            for it in articles {
                let title = clean(it.title);
                let Some(url) = it.url.filter(|u| !u.trim().is_empty()) else {
                    continue;
                };
                if title.is_empty() {
                    continue;
                }
                page.articles.push(RawArticle {
                    external_id: None,
                    title,
                    description: clean(it.description),
                    body: clean(it.content),
                    url: url.trim().to_string(),
                    source_name: it
                        .source
                        .and_then(|s| s.name)
                        .map(|n| normalize_text(&n))
                        .unwrap_or_else(|| provider.to_string()),
                    author: it.author.map(|a| normalize_text(&a)).filter(|a| !a.is_empty()),
                    published_at: it.published_at.as_deref().and_then(parse_api_timestamp),
                    category_hint: Some(category.to_string()),
                });
            }
        }
        ApiResponse::Results { results, next_page } => {
            page.token_paged = true;
            page.next_token = next_page.filter(|t| !t.is_empty());
            for it in results {
                let title = clean(it.title);
                let Some(url) = it.link.filter(|u| !u.trim().is_empty()) else {
                    continue;
                };
                if title.is_empty() {
                    continue;
                }
                page.articles.push(RawArticle {
                    external_id: it.article_id.filter(|id| !id.trim().is_empty()),
                    title,
                    description: clean(it.description),
                    body: clean(it.content),
                    url: url.trim().to_string(),
                    source_name: it
                        .source_name
                        .or(it.source_id)
                        .map(|n| normalize_text(&n))
                        .unwrap_or_else(|| provider.to_string()),
                    author: it.creator.and_then(|c| c.into_iter().next()),
                    published_at: it.pub_date.as_deref().and_then(parse_api_timestamp),
                    category_hint: Some(category.to_string()),
                });
            }
        }
        ApiResponse::Failure { status, message } => {
            bail!(
                "{provider} returned status={} message={}",
                status.unwrap_or_default(),
                message.unwrap_or_default()
            );
        }
    }
    Ok(page)
}

pub struct JsonApiClient {
    id: String,
    endpoint: Url,
    api_key: Option<(String, String)>,
    page_size: (String, u32),
    query: BTreeMap<String, String>,
    client: reqwest::Client,
}

impl JsonApiClient {
    /// Reads the API key from the configured env var; a configured but unset
    /// key is an error so the provider is left out rather than failing every
    /// pass.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let endpoint = Url::parse(&cfg.endpoint)
            .with_context(|| format!("invalid endpoint for {}", cfg.id))?;
        let api_key = match cfg.api_key_env.as_deref() {
            None => None,
            Some(var) => {
                let key = std::env::var(var)
                    .ok()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| anyhow!("{var} not set"))?;
                Some((cfg.key_param.clone(), key))
            }
        };
        Ok(Self {
            id: cfg.id.clone(),
            endpoint,
            api_key,
            page_size: (cfg.page_size_param.clone(), cfg.page_size.max(1)),
            query: cfg.query.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn page_url(&self, category: &str, page: u32, token: Option<&str>) -> Url {
        let mut u = self.endpoint.clone();
        {
            let mut q = u.query_pairs_mut();
            for (k, v) in &self.query {
                q.append_pair(k, v);
            }
            q.append_pair("category", upstream_category(category));
            q.append_pair(&self.page_size.0, &self.page_size.1.to_string());
            match token {
                Some(t) => {
                    q.append_pair("page", t);
                }
                None if page > 1 => {
                    q.append_pair("page", &page.to_string());
                }
                None => {}
            }
            if let Some((param, key)) = &self.api_key {
                q.append_pair(param, key);
            }
        }
        u
    }

    async fn get_page(&self, url: Url, category: &str) -> Result<Page> {
        let t0 = std::time::Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("{} http get()", self.id))?
            .text()
            .await
            .with_context(|| format!("{} http .text()", self.id))?;
        let page = parse_page(&body, &self.id, category)?;
        histogram!("ingest_fetch_ms", "source" => self.id.clone())
            .record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(page)
    }
}

#[async_trait]
impl SourceClient for JsonApiClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, category: &str, budget: u32) -> Result<SourceBatch> {
        let mut batch = SourceBatch::default();
        let mut token: Option<String> = None;
        for page_no in 1..=budget {
            let url = self.page_url(category, page_no, token.as_deref());
            batch.requests_made += 1;
            let page = match self.get_page(url, category).await {
                Ok(p) => p,
                // The first page failing fails the call; later pages keep
                // what was already fetched.
                Err(e) if page_no == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "ingest", source = %self.id, page = page_no, error = ?e, "paging stopped");
                    break;
                }
            };
            let n = page.articles.len();
            batch.articles.extend(page.articles);
            if n < self.page_size.1 as usize {
                break;
            }
            if page.token_paged {
                match page.next_token {
                    Some(t) => token = Some(t),
                    None => break,
                }
            }
        }
        counter!("ingest_fetched_total").increment(batch.articles.len() as u64);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_providers;

    #[test]
    fn parses_articles_shape() {
        let body = r#"{"status":"ok","totalResults":2,"articles":[
            {"source":{"id":null,"name":"The Hindu"},"author":"PTI","title":"Sensex ends higher",
             "description":"Markets <b>rallied</b>","url":"https://www.thehindu.com/business/a1",
             "publishedAt":"2025-06-09T05:00:00Z","content":"Full text"},
            {"source":{"name":"X"},"title":"","url":"https://x.in/2"}]}"#;
        let p = parse_page(body, "newsapi", "markets").unwrap();
        assert_eq!(p.articles.len(), 1);
        let a = &p.articles[0];
        assert_eq!(a.source_name, "The Hindu");
        assert_eq!(a.description, "Markets rallied");
        assert_eq!(a.category_hint.as_deref(), Some("markets"));
        assert!(!p.token_paged);
    }

    #[test]
    fn parses_results_shape_with_token() {
        let body = r#"{"status":"success","results":[
            {"article_id":"nd-1","title":"ISRO launch","link":"https://example.in/isro",
             "creator":["Staff"],"pubDate":"2025-06-09 05:00:00","source_id":"toi"}],
            "nextPage":"abc123"}"#;
        let p = parse_page(body, "newsdata", "science").unwrap();
        assert!(p.token_paged);
        assert_eq!(p.next_token.as_deref(), Some("abc123"));
        assert_eq!(p.articles[0].external_id.as_deref(), Some("nd-1"));
        assert_eq!(p.articles[0].author.as_deref(), Some("Staff"));
        assert_eq!(p.articles[0].source_name, "toi");
    }

    #[test]
    fn error_body_is_an_error() {
        let body = r#"{"status":"error","code":"rateLimited","message":"Too many requests"}"#;
        let err = parse_page(body, "newsapi", "general").unwrap_err();
        assert!(format!("{err:#}").contains("Too many requests"));
    }

    #[test]
    fn page_url_carries_params() {
        let mut cfg = default_providers().remove(0);
        cfg.api_key_env = None;
        let c = JsonApiClient::from_config(&cfg).unwrap();
        let u = c.page_url("markets", 2, None);
        let q: BTreeMap<String, String> = u.query_pairs().into_owned().collect();
        assert_eq!(q["country"], "in");
        assert_eq!(q["category"], "business");
        assert_eq!(q["page"], "2");
        assert_eq!(q["pageSize"], "20");
        assert!(!q.contains_key("apiKey"));
    }

    #[test]
    fn missing_key_env_fails_construction() {
        let mut cfg = default_providers().remove(0);
        cfg.api_key_env = Some("NEWS_INGEST_TEST_KEY_THAT_IS_NEVER_SET".into());
        assert!(JsonApiClient::from_config(&cfg).is_err());
    }
}
