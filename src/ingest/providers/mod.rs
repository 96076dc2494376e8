// src/ingest/providers/mod.rs
//! Provider adapters behind `SourceClient`.

pub mod fixture;
pub mod json_api;
pub mod rss;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use time::{format_description::well_known::Rfc2822, format_description::well_known::Rfc3339, OffsetDateTime};

use crate::config::{ProviderConfig, ProviderKind};
use crate::ingest::types::SourceClient;

pub use fixture::StaticSourceClient;
pub use json_api::JsonApiClient;
pub use rss::RssClient;

/// Clean provider text: decode HTML entities, strip tags, normalize curly
/// quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Option<Regex>> = OnceCell::new();
    static RE_WS: OnceCell<Option<Regex>> = OnceCell::new();

    let mut out = html_escape::decode_html_entities(s).to_string();

    if let Some(re) = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").ok()) {
        out = re.replace_all(&out, " ").to_string();
    }

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    match RE_WS.get_or_init(|| Regex::new(r"\s+").ok()) {
        Some(re) => re.replace_all(&out, " ").trim().to_string(),
        None => out.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

fn from_offset(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
}

/// RSS `pubDate` (RFC 2822).
pub fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822).ok().and_then(from_offset)
}

/// JSON API timestamps: RFC 3339, or NewsData's `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn parse_api_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if let Some(dt) = OffsetDateTime::parse(ts, &Rfc3339).ok().and_then(from_offset) {
        return Some(dt);
    }
    chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|n| n.and_utc())
}

/// Map our category names onto what the upstream APIs accept.
pub fn upstream_category(category: &str) -> &str {
    match category {
        "breaking" | "politics" => "general",
        "markets" => "business",
        other => other,
    }
}

/// Build one client per configured provider. Providers that cannot be built
/// (missing API key, bad endpoint) are logged and left out.
pub fn build_clients(providers: &[ProviderConfig]) -> HashMap<String, Arc<dyn SourceClient>> {
    let mut out: HashMap<String, Arc<dyn SourceClient>> = HashMap::new();
    for p in providers {
        let built: anyhow::Result<Arc<dyn SourceClient>> = match p.kind {
            ProviderKind::JsonApi => JsonApiClient::from_config(p).map(|c| Arc::new(c) as _),
            ProviderKind::Rss => RssClient::from_config(p).map(|c| Arc::new(c) as _),
        };
        match built {
            Ok(c) => {
                out.insert(p.id.clone(), c);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", source = %p.id, error = ?e, "provider disabled");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn normalize_text_strips_markup() {
        let out = normalize_text("  <p>RBI&nbsp;holds   rates</p>\n<b>“steady”</b> ");
        assert_eq!(out, "RBI holds rates \"steady\"");
    }

    #[test]
    fn timestamps_parse() {
        let a = parse_rfc2822("Mon, 09 Jun 2025 10:30:00 +0530").unwrap();
        assert_eq!((a.hour(), a.minute()), (5, 0));
        let b = parse_api_timestamp("2025-06-09T05:00:00Z").unwrap();
        assert_eq!(a, b);
        let c = parse_api_timestamp("2025-06-09 05:00:00").unwrap();
        assert_eq!(c, b);
        assert_eq!(c.day(), 9);
        assert!(parse_api_timestamp("yesterday").is_none());
    }

    #[test]
    fn category_mapping() {
        assert_eq!(upstream_category("markets"), "business");
        assert_eq!(upstream_category("breaking"), "general");
        assert_eq!(upstream_category("sports"), "sports");
    }
}
