// src/config/mod.rs
//! Layered configuration for the ingestion core.
//!
//! Lookup order:
//! 1) `$INGEST_CONFIG_PATH` (must exist if set)
//! 2) `config/ingest.toml`
//! 3) `config/ingest.json`
//! 4) built-in defaults

pub mod providers;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::clock::IST_OFFSET_MINUTES;
use crate::dedup::DedupConfig;
use crate::quota::budget::DEFAULT_HOURLY_BUDGET;

pub use providers::{default_providers, ProviderConfig, ProviderKind};

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/ingest.toml";
pub const DEFAULT_JSON_PATH: &str = "config/ingest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Target locale offset, minutes east of UTC.
    #[serde(default = "default_offset")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Optional 24-entry override of the advisory hourly request table.
    #[serde(default)]
    pub hourly_budget: Option<Vec<u32>>,
}

fn default_offset() -> i32 {
    IST_OFFSET_MINUTES
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_offset(),
            providers: default_providers(),
            orchestrator: OrchestratorConfig::default(),
            dedup: DedupConfig::default(),
            cache: CacheConfig::default(),
            hourly_budget: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Categories covered by a full refresh.
    pub categories: Vec<String>,
    pub max_concurrent_passes: usize,
    pub fetch_timeout_secs: u64,
    pub max_requests_per_pass: u32,
    /// Lookback for the dedup snapshot and the cache pre-populate query.
    pub recent_window_hours: i64,
    pub cache_page_size: usize,
    pub refresh_interval_secs: u64,
    pub reset_tick_secs: u64,
    /// Where the quota ledger is snapshotted between restarts.
    pub ledger_path: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            categories: [
                "general",
                "breaking",
                "business",
                "markets",
                "sports",
                "technology",
                "entertainment",
                "health",
                "science",
                "politics",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_concurrent_passes: 3,
            fetch_timeout_secs: 10,
            max_requests_per_pass: 3,
            recent_window_hours: 48,
            cache_page_size: 20,
            refresh_interval_secs: 900,
            reset_tick_secs: 60,
            ledger_path: None,
        }
    }
}

impl IngestConfig {
    /// Normalize and reject configurations the allocator cannot honor.
    pub fn validated(mut self) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &mut self.providers {
            p.sanitize();
            if p.id.is_empty() {
                bail!("provider with empty id");
            }
            if !seen.insert(p.id.to_ascii_lowercase()) {
                bail!("duplicate provider id `{}`", p.id);
            }
        }
        self.providers.sort_by_key(|p| p.priority);

        if let Some(table) = &self.hourly_budget {
            if table.len() != 24 {
                bail!("hourly_budget must have 24 entries, got {}", table.len());
            }
        }

        let o = &mut self.orchestrator;
        o.max_concurrent_passes = o.max_concurrent_passes.max(1);
        o.fetch_timeout_secs = o.fetch_timeout_secs.max(1);
        o.max_requests_per_pass = o.max_requests_per_pass.max(1);
        o.cache_page_size = o.cache_page_size.max(1);
        o.refresh_interval_secs = o.refresh_interval_secs.max(1);
        o.reset_tick_secs = o.reset_tick_secs.max(1);
        let mut cats = HashSet::new();
        o.categories = o
            .categories
            .iter()
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty() && cats.insert(c.clone()))
            .collect();

        self.dedup.sanitize();
        Ok(self)
    }

    /// The 24-entry advisory table (override or built-in).
    pub fn hourly_budget_table(&self) -> [u32; 24] {
        match &self.hourly_budget {
            Some(v) if v.len() == 24 => {
                let mut out = [0u32; 24];
                out.copy_from_slice(v);
                out
            }
            _ => DEFAULT_HOURLY_BUDGET,
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON.
pub fn load_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing ingest config {}", path.display()))?
        .validated()
}

/// Load config using env var + fallbacks, ending with built-in defaults.
pub fn load_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_from(&json_p);
    }
    tracing::warn!(target: "config", "no ingest config found, using built-in defaults");
    IngestConfig::default().validated()
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    if hint_ext == "toml" {
        return Ok(toml::from_str(s)?);
    }
    // Unknown extension: JSON documents start with `{`.
    if s.trim_start().starts_with('{') {
        Ok(serde_json::from_str(s)?)
    } else {
        Ok(toml::from_str(s)?)
    }
}
