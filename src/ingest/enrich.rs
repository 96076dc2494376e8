// src/ingest/enrich.rs
//! # Enrichment
//!
//! Derived fields computed for articles that survived dedup:
//! word count, reading time, a heuristic India-relevance score and a coarse
//! content-origin flag.
//!
//! - Outlet lookup goes alias → exact → substring, on normalized names.
//! - Keyword hits and Indian outlets each raise the score by a fixed step.
//! - Boosts stop at `BOOST_CAP` unless the score was already at or above it.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::types::{Article, ContentOrigin, RawArticle};
use crate::dedup::Fingerprint;

/// Reading speed used for `reading_time_minutes`.
pub const WORDS_PER_MINUTE: usize = 200;
pub const BASE_RELEVANCE: f32 = 0.5;
pub const BOOST_CAP: f32 = 0.8;
const KEYWORD_STEP: f32 = 0.05;
const OUTLET_STEP: f32 = 0.15;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn reading_time_minutes(words: usize) -> u32 {
    (words / WORDS_PER_MINUTE).max(1) as u32
}

/// Raise `score` by `boost`, staying under `BOOST_CAP` unless `score` is
/// already high, in which case the ceiling is 1.0.
pub fn apply_boost(score: f32, boost: f32) -> f32 {
    let ceiling = if score >= BOOST_CAP { 1.0 } else { BOOST_CAP };
    clamp01((score + boost).min(ceiling).max(score))
}

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Lowercase, turn separators and punctuation into spaces, collapse runs.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\'', ':', ';', '(', ')'], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keyword and outlet lists used to score India relevance.
#[derive(Debug, Clone)]
pub struct Enricher {
    keywords: Vec<String>,
    outlets: Vec<String>,
    aliases: HashMap<String, String>,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl Enricher {
    pub fn default_seed() -> Self {
        let keywords = [
            "india", "indian", "delhi", "new delhi", "mumbai", "bengaluru", "bangalore",
            "chennai", "kolkata", "hyderabad", "pune", "ahmedabad", "kerala", "punjab",
            "maharashtra", "tamil nadu", "uttar pradesh", "karnataka", "gujarat", "bihar",
            "modi", "lok sabha", "rajya sabha", "parliament", "bjp", "congress", "rbi",
            "sebi", "sensex", "nifty", "bse", "nse", "rupee", "isro", "bcci", "ipl",
            "bollywood", "monsoon", "imd",
        ];
        let outlets = [
            "the hindu", "times of india", "hindustan times", "indian express", "ndtv",
            "india today", "news18", "the print", "scroll", "livemint", "economic times",
            "business standard", "moneycontrol", "deccan herald", "the wire", "firstpost",
            "zee news", "pti", "ani",
        ];
        let aliases = [
            ("toi", "times of india"),
            ("the times of india", "times of india"),
            ("timesofindia indiatimes com", "times of india"),
            ("ht", "hindustan times"),
            ("hindustantimes com", "hindustan times"),
            ("the indian express", "indian express"),
            ("indianexpress com", "indian express"),
            ("thehindu com", "the hindu"),
            ("ndtv com", "ndtv"),
            ("mint", "livemint"),
            ("et", "economic times"),
            ("the economic times", "economic times"),
            ("press trust of india", "pti"),
            ("asian news international", "ani"),
            ("theprint", "the print"),
            ("scroll in", "scroll"),
        ];
        Self {
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            outlets: outlets.iter().map(|s| s.to_string()).collect(),
            aliases: aliases
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
        }
    }

    /// Canonical Indian outlet name for `source`, if it is one.
    pub fn indian_outlet(&self, source: &str) -> Option<&str> {
        let s = normalize(source);
        if s.is_empty() {
            return None;
        }
        if let Some(c) = self.aliases.get(&s) {
            return self.outlets.iter().find(|o| *o == c).map(String::as_str);
        }
        if let Some(o) = self.outlets.iter().find(|o| **o == s) {
            return Some(o);
        }
        // Short names ("pti", "ani") only match as whole words.
        let padded = format!(" {s} ");
        self.outlets
            .iter()
            .find(|o| padded.contains(&format!(" {o} ")))
            .map(String::as_str)
    }

    /// Distinct keywords found in `text`, matched on word boundaries.
    pub fn keyword_hits(&self, text: &str) -> usize {
        let padded = format!(" {} ", normalize(text));
        self.keywords
            .iter()
            .filter(|k| padded.contains(&format!(" {k} ")))
            .count()
    }

    pub fn content_origin(&self, source: &str, keyword_hits: usize) -> ContentOrigin {
        if self.indian_outlet(source).is_some() {
            ContentOrigin::Indian
        } else if source.trim().is_empty() && keyword_hits == 0 {
            ContentOrigin::Unknown
        } else if keyword_hits >= 2 {
            ContentOrigin::Indian
        } else {
            ContentOrigin::International
        }
    }

    pub fn relevance(&self, source: &str, keyword_hits: usize) -> f32 {
        let mut boost = KEYWORD_STEP * keyword_hits as f32;
        if self.indian_outlet(source).is_some() {
            boost += OUTLET_STEP;
        }
        apply_boost(BASE_RELEVANCE, boost)
    }

    /// Build the stored form of a kept article.
    pub fn enrich(
        &self,
        raw: RawArticle,
        fp: &Fingerprint,
        category: &str,
        provider: &str,
        fetched_at: DateTime<Utc>,
    ) -> Article {
        let text = if raw.body.trim().is_empty() {
            format!("{} {}", raw.title, raw.description)
        } else {
            format!("{} {}", raw.title, raw.body)
        };
        let words = word_count(&text);
        let hits = self.keyword_hits(&format!("{} {}", raw.title, raw.description));
        Article {
            key: fp.key.clone(),
            external_id: raw.external_id,
            relevance_score: self.relevance(&raw.source_name, hits),
            content_origin: self.content_origin(&raw.source_name, hits),
            title: raw.title,
            description: raw.description,
            body: raw.body,
            url: fp.url.clone(),
            source_name: raw.source_name,
            author: raw.author,
            published_at: raw.published_at,
            category: category.to_string(),
            provider: provider.to_string(),
            content_hash: fp.content_hash.clone(),
            word_count: words,
            reading_time_minutes: reading_time_minutes(words),
            fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_time_floors_at_one_minute() {
        assert_eq!(reading_time_minutes(0), 1);
        assert_eq!(reading_time_minutes(199), 1);
        assert_eq!(reading_time_minutes(450), 2);
    }

    #[test]
    fn boost_is_capped_low_unless_already_high() {
        assert!((apply_boost(0.5, 0.6) - BOOST_CAP).abs() < 1e-6);
        assert!((apply_boost(0.85, 0.1) - 0.95).abs() < 1e-6);
        assert!((apply_boost(0.9, 0.5) - 1.0).abs() < 1e-6);
        assert!((apply_boost(0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn outlet_lookup_is_alias_tolerant() {
        let e = Enricher::default();
        assert_eq!(e.indian_outlet("The Times of India"), Some("times of india"));
        assert_eq!(e.indian_outlet("TOI"), Some("times of india"));
        assert_eq!(e.indian_outlet("NDTV Sports"), Some("ndtv"));
        assert_eq!(e.indian_outlet("Animal Planet"), None);
        assert_eq!(e.indian_outlet("Reuters"), None);
    }

    #[test]
    fn keyword_hits_respect_word_boundaries() {
        let e = Enricher::default();
        assert_eq!(e.keyword_hits("RBI holds repo rate; Sensex flat"), 2);
        assert_eq!(e.keyword_hits("Indiana Jones returns"), 0);
    }

    #[test]
    fn origin_classification() {
        let e = Enricher::default();
        assert_eq!(e.content_origin("Hindustan Times", 0), ContentOrigin::Indian);
        assert_eq!(e.content_origin("BBC", 3), ContentOrigin::Indian);
        assert_eq!(e.content_origin("BBC", 1), ContentOrigin::International);
        assert_eq!(e.content_origin("", 0), ContentOrigin::Unknown);
    }

    #[test]
    fn relevance_prefers_indian_outlets() {
        let e = Enricher::default();
        let local = e.relevance("The Hindu", 1);
        let foreign = e.relevance("BBC", 1);
        assert!(local > foreign);
        assert!(local <= BOOST_CAP);
    }
}
