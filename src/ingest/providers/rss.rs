// src/ingest/providers/rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{normalize_text, parse_rfc2822};
use crate::config::ProviderConfig;
use crate::ingest::types::{RawArticle, SourceBatch, SourceClient};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// RSS 2.0 feed. One HTTP request per fetch regardless of the budget.
pub struct RssClient {
    id: String,
    mode: Mode,
}

impl RssClient {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        url::Url::parse(&cfg.endpoint)
            .with_context(|| format!("invalid feed url for {}", cfg.id))?;
        Ok(Self::from_url(&cfg.id, &cfg.endpoint))
    }

    pub fn from_url(id: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client: reqwest::Client::new(),
            },
        }
    }

    pub fn from_fixture(id: &str, xml: &str) -> Self {
        Self {
            id: id.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str, category: &str) -> Result<Vec<RawArticle>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).with_context(|| format!("parsing {} rss xml", self.id))?;
        let feed_name = rss
            .channel
            .title
            .as_deref()
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.id.clone());

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            let Some(url) = it.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            out.push(RawArticle {
                external_id: it.guid.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
                title,
                description: normalize_text(it.description.as_deref().unwrap_or_default()),
                body: String::new(),
                url,
                source_name: feed_name.clone(),
                author: it.author.or(it.creator).map(|a| normalize_text(&a)),
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
                category_hint: Some(category.to_string()),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms", "source" => self.id.clone()).record(ms);
        counter!("ingest_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceClient for RssClient {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, category: &str, budget: u32) -> Result<SourceBatch> {
        if budget == 0 {
            return Ok(SourceBatch::default());
        }
        let articles = match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s, category)?,
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .with_context(|| format!("{} http get()", self.id))?
                    .text()
                    .await
                    .with_context(|| format!("{} http .text()", self.id))?;
                self.parse_items_from_str(&body, category)?
            }
        };
        Ok(SourceBatch {
            articles,
            requests_made: 1,
        })
    }
}

/// quick-xml only knows the XML entities; feeds routinely ship HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
        .replace("&rupee;", "Rs")
}
