// src/config/providers.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// NewsAPI / GNews / NewsData style JSON endpoints.
    JsonApi,
    Rss,
}

/// Static description of one upstream provider: how to call it and its quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    /// Env var holding the API key. Providers without a key skip the param.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_key_param")]
    pub key_param: String,
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Extra fixed query params (e.g. `country = "in"`).
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    pub daily_limit: u32,
    pub hourly_limit: u32,
    /// Soft ceiling below `daily_limit` the allocator enforces.
    pub conservative_limit: u32,
    pub priority: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Categories this provider serves. Empty means all.
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_key_param() -> String {
    "apiKey".to_string()
}
fn default_page_size_param() -> String {
    "pageSize".to_string()
}
fn default_page_size() -> u32 {
    20
}
fn default_active() -> bool {
    true
}

impl ProviderConfig {
    /// Keep the soft ceiling strictly under the hard limit and the hourly
    /// limit within the daily one.
    pub(crate) fn sanitize(&mut self) {
        self.hourly_limit = self.hourly_limit.min(self.daily_limit);
        if self.daily_limit == 0 {
            self.conservative_limit = 0;
        } else if self.conservative_limit >= self.daily_limit {
            self.conservative_limit = self.daily_limit - 1;
        }
        self.id = self.id.trim().to_string();
    }
}

fn india_query() -> BTreeMap<String, String> {
    let mut q = BTreeMap::new();
    q.insert("country".to_string(), "in".to_string());
    q
}

/// Built-in tiers: primary, secondary, tertiary, emergency.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "newsapi".into(),
            kind: ProviderKind::JsonApi,
            endpoint: "https://newsapi.org/v2/top-headlines".into(),
            api_key_env: Some("NEWSAPI_KEY".into()),
            key_param: "apiKey".into(),
            page_size_param: "pageSize".into(),
            page_size: 20,
            query: india_query(),
            daily_limit: 100,
            hourly_limit: 10,
            conservative_limit: 90,
            priority: 1,
            active: true,
            categories: vec![],
        },
        ProviderConfig {
            id: "gnews".into(),
            kind: ProviderKind::JsonApi,
            endpoint: "https://gnews.io/api/v4/top-headlines".into(),
            api_key_env: Some("GNEWS_API_KEY".into()),
            key_param: "apikey".into(),
            page_size_param: "max".into(),
            page_size: 10,
            query: india_query(),
            daily_limit: 100,
            hourly_limit: 10,
            conservative_limit: 85,
            priority: 2,
            active: true,
            categories: vec![],
        },
        ProviderConfig {
            id: "newsdata".into(),
            kind: ProviderKind::JsonApi,
            endpoint: "https://newsdata.io/api/1/latest".into(),
            api_key_env: Some("NEWSDATA_API_KEY".into()),
            key_param: "apikey".into(),
            page_size_param: "size".into(),
            page_size: 10,
            query: india_query(),
            daily_limit: 200,
            hourly_limit: 20,
            conservative_limit: 180,
            priority: 3,
            active: true,
            categories: vec![],
        },
        ProviderConfig {
            id: "ndtv-rss".into(),
            kind: ProviderKind::Rss,
            endpoint: "https://feeds.feedburner.com/ndtvnews-top-stories".into(),
            api_key_env: None,
            key_param: default_key_param(),
            page_size_param: default_page_size_param(),
            page_size: 50,
            query: BTreeMap::new(),
            daily_limit: 500,
            hourly_limit: 40,
            conservative_limit: 450,
            priority: 4,
            active: true,
            categories: vec![],
        },
    ]
}
