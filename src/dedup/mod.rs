// src/dedup/mod.rs
//! Duplicate detection against a bounded recent window.
//!
//! Decision order, first match wins:
//! 1) exact normalized URL
//! 2) content hash of normalized title + body
//! 3) title similarity >= threshold AND publication inside the time window
//! 4) original
//!
//! The index is a read-only snapshot taken at pass start plus whatever was
//! accepted earlier in the same pass, so near-duplicates arriving together
//! cannot both get in.

pub mod normalize;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::clock::{offset_from_minutes, IST_OFFSET_MINUTES};
use crate::ingest::types::{Article, RawArticle};

use self::normalize::{content_hash, normalize_title, normalize_url};

fn default_threshold() -> f64 {
    0.80
}
fn default_same_day() -> bool {
    true
}
fn default_window_hours() -> i64 {
    24
}

/// Matching thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_threshold")]
    pub title_similarity_threshold: f64,
    /// Title matches require the same calendar day in the target locale.
    #[serde(default = "default_same_day")]
    pub same_day: bool,
    /// Used instead of `same_day` when that is off.
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_similarity_threshold: default_threshold(),
            same_day: default_same_day(),
            window_hours: default_window_hours(),
        }
    }
}

impl DedupConfig {
    pub(crate) fn sanitize(&mut self) {
        if !self.title_similarity_threshold.is_finite() {
            self.title_similarity_threshold = default_threshold();
        }
        self.title_similarity_threshold = self.title_similarity_threshold.clamp(0.0, 1.0);
        self.window_hours = self.window_hours.max(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    UrlExact,
    ContentHash,
    TitleSimilarity,
    Original,
}

impl DetectionMethod {
    pub fn label(self) -> &'static str {
        match self {
            DetectionMethod::UrlExact => "url_exact",
            DetectionMethod::ContentHash => "content_hash",
            DetectionMethod::TitleSimilarity => "title_similarity",
            DetectionMethod::Original => "original",
        }
    }
}

/// Which signals were evaluated and what they said.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSignals {
    pub url_match: bool,
    pub content_hash_match: bool,
    /// Best title similarity seen, if the title step ran.
    pub title_similarity: Option<f64>,
    pub time_window_match: bool,
}

/// Reference to the article a candidate collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedArticle {
    pub key: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    /// Storage key of the candidate.
    pub candidate: String,
    pub is_duplicate: bool,
    pub matched: Option<MatchedArticle>,
    pub signals: DuplicateSignals,
    pub method: DetectionMethod,
}

/// Matchable form of an article.
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub key: String,
    pub url: String,
    pub content_hash: String,
    /// False when the hash covers the title alone (no body or description).
    /// Such hashes are not matched; the title goes through the time-gated
    /// similarity check instead.
    pub hash_has_body: bool,
    pub title: String,
    pub display_title: String,
    pub published_at: Option<DateTime<Utc>>,
}

impl Fingerprint {
    pub fn of_raw(a: &RawArticle) -> Self {
        Self {
            key: a.storage_key(),
            url: normalize_url(&a.url),
            content_hash: content_hash(&a.title, a.hash_body()),
            hash_has_body: !a.hash_body().trim().is_empty(),
            title: normalize_title(&a.title),
            display_title: a.title.clone(),
            published_at: a.published_at,
        }
    }

    pub fn of_stored(a: &Article) -> Self {
        Self {
            key: a.key.clone(),
            url: normalize_url(&a.url),
            content_hash: a.content_hash.clone(),
            hash_has_body: !(a.body.trim().is_empty() && a.description.trim().is_empty()),
            title: normalize_title(&a.title),
            display_title: a.title.clone(),
            published_at: a.published_at,
        }
    }

    fn reference(&self) -> MatchedArticle {
        MatchedArticle {
            key: self.key.clone(),
            url: self.url.clone(),
            title: self.display_title.clone(),
        }
    }
}

/// Articles a pass compares against: the pre-pass snapshot plus everything
/// accepted so far in this pass.
#[derive(Debug, Default)]
pub struct DedupIndex {
    entries: Vec<Fingerprint>,
    by_url: HashMap<String, usize>,
    by_hash: HashMap<String, usize>,
    /// URLs known to the store but outside the snapshot window.
    known_urls: HashSet<String>,
    snapshot_len: usize,
}

impl DedupIndex {
    pub fn from_snapshot<'a, I>(existing: I) -> Self
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let mut idx = Self::default();
        for a in existing {
            idx.insert(Fingerprint::of_stored(a));
        }
        idx.snapshot_len = idx.entries.len();
        idx
    }

    fn insert(&mut self, fp: Fingerprint) {
        let i = self.entries.len();
        self.by_url.entry(fp.url.clone()).or_insert(i);
        if fp.hash_has_body {
            self.by_hash.entry(fp.content_hash.clone()).or_insert(i);
        }
        self.entries.push(fp);
    }

    /// Record an article accepted in this pass.
    pub fn accept(&mut self, fp: Fingerprint) {
        self.insert(fp);
    }

    /// Mark a URL as already stored (older than the snapshot window).
    pub fn add_known_url(&mut self, url: &str) {
        self.known_urls.insert(normalize_url(url));
    }

    pub fn contains_url(&self, url: &str) -> bool {
        let u = normalize_url(url);
        self.by_url.contains_key(&u) || self.known_urls.contains(&u)
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot_len
    }

    pub fn accepted_len(&self) -> usize {
        self.entries.len() - self.snapshot_len
    }
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    cfg: DedupConfig,
    offset: FixedOffset,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default(), offset_from_minutes(IST_OFFSET_MINUTES))
    }
}

impl Deduplicator {
    pub fn new(mut cfg: DedupConfig, offset: FixedOffset) -> Self {
        cfg.sanitize();
        Self { cfg, offset }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.cfg
    }

    /// Classify one candidate. Never mutates the index.
    pub fn classify(&self, candidate: &Fingerprint, index: &DedupIndex) -> DuplicateVerdict {
        let mut signals = DuplicateSignals::default();

        // 1) URL
        if let Some(&i) = index.by_url.get(&candidate.url) {
            signals.url_match = true;
            return self.verdict(
                candidate,
                Some(index.entries[i].reference()),
                signals,
                DetectionMethod::UrlExact,
            );
        }
        if index.known_urls.contains(&candidate.url) {
            signals.url_match = true;
            let matched = MatchedArticle {
                key: candidate.url.clone(),
                url: candidate.url.clone(),
                title: String::new(),
            };
            return self.verdict(candidate, Some(matched), signals, DetectionMethod::UrlExact);
        }

        // 2) content hash
        let by_hash = candidate
            .hash_has_body
            .then(|| index.by_hash.get(&candidate.content_hash))
            .flatten();
        if let Some(&i) = by_hash {
            signals.content_hash_match = true;
            return self.verdict(
                candidate,
                Some(index.entries[i].reference()),
                signals,
                DetectionMethod::ContentHash,
            );
        }

        // 3) title similarity gated by the time window
        let mut best: Option<(f64, usize)> = None;
        let mut best_any = 0.0f64;
        if !candidate.title.is_empty() {
            for (i, e) in index.entries.iter().enumerate() {
                if e.title.is_empty() {
                    continue;
                }
                let sim = strsim::normalized_levenshtein(&candidate.title, &e.title);
                best_any = best_any.max(sim);
                if sim < self.cfg.title_similarity_threshold {
                    continue;
                }
                if !self.within_window(candidate.published_at, e.published_at) {
                    continue;
                }
                if best.map_or(true, |(b, _)| sim > b) {
                    best = Some((sim, i));
                }
            }
            signals.title_similarity = Some(best_any);
        }
        if let Some((sim, i)) = best {
            signals.title_similarity = Some(sim.max(best_any));
            signals.time_window_match = true;
            return self.verdict(
                candidate,
                Some(index.entries[i].reference()),
                signals,
                DetectionMethod::TitleSimilarity,
            );
        }

        self.verdict(candidate, None, signals, DetectionMethod::Original)
    }

    fn verdict(
        &self,
        candidate: &Fingerprint,
        matched: Option<MatchedArticle>,
        signals: DuplicateSignals,
        method: DetectionMethod,
    ) -> DuplicateVerdict {
        DuplicateVerdict {
            candidate: candidate.key.clone(),
            is_duplicate: method != DetectionMethod::Original,
            matched,
            signals,
            method,
        }
    }

    /// Both timestamps must be known and fall in the same window.
    pub fn within_window(&self, a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
        let (Some(a), Some(b)) = (a, b) else {
            return false;
        };
        if self.cfg.same_day {
            a.with_timezone(&self.offset).date_naive() == b.with_timezone(&self.offset).date_naive()
        } else {
            (a - b).abs() <= Duration::hours(self.cfg.window_hours)
        }
    }

    /// Split a batch into originals and duplicate verdicts, growing the index
    /// with each accepted article. Input order is preserved.
    pub fn partition(
        &self,
        batch: Vec<RawArticle>,
        index: &mut DedupIndex,
    ) -> (Vec<(RawArticle, Fingerprint)>, Vec<DuplicateVerdict>) {
        let mut keep = Vec::with_capacity(batch.len());
        let mut dups = Vec::new();
        for raw in batch {
            let fp = Fingerprint::of_raw(&raw);
            let v = self.classify(&fp, index);
            if v.is_duplicate {
                tracing::debug!(
                    target: "dedup",
                    candidate = %v.candidate,
                    method = v.method.label(),
                    "duplicate dropped"
                );
                dups.push(v);
            } else {
                index.accept(fp.clone());
                keep.push((raw, fp));
            }
        }
        (keep, dups)
    }
}
