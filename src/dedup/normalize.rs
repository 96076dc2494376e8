// src/dedup/normalize.rs
//! Canonical forms used for matching: URLs, titles and content hashes.

use sha2::{Digest, Sha256};
use url::Url;

/// Query params that only track the click, never change the article.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src", "cmpid", "ito",
];

/// Normalize a URL for equality checks:
/// lower-cased host without `www.`, https scheme, no fragment, no tracking
/// params, sorted query, no trailing slash. Unparseable input falls back to a
/// trimmed, lower-cased string.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut u) = Url::parse(trimmed) else {
        return trimmed.trim_end_matches('/').to_ascii_lowercase();
    };
    u.set_fragment(None);
    if u.scheme() == "http" {
        let _ = u.set_scheme("https");
    }
    let host = u
        .host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase());
    if let Some(h) = host {
        let _ = u.set_host(Some(&h));
    }
    let path = u.path().trim_end_matches('/').to_string();
    if path.is_empty() {
        u.set_path("/");
    } else {
        u.set_path(&path);
    }

    let mut pairs: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        u.set_query(None);
    } else {
        u.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let mut out = u.to_string();
    while out.ends_with('/') {
        out.pop();
    }
    out
}

/// Lower-case and collapse whitespace.
pub fn collapse_lower(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title form for fuzzy comparison: lower-cased, punctuation dropped,
/// whitespace collapsed.
pub fn normalize_title(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    collapse_lower(&cleaned)
}

/// SHA-256 (hex) of the normalized title + body.
pub fn content_hash(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collapse_lower(title).as_bytes());
    hasher.update(b"\n");
    hasher.update(collapse_lower(body).as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_normalization_drops_noise() {
        let a = normalize_url("http://www.NDTV.com/india-news/story-123/?utm_source=tw&b=2&a=1#top");
        let b = normalize_url("https://ndtv.com/india-news/story-123?a=1&b=2");
        assert_eq!(a, b);
        assert_eq!(b, "https://ndtv.com/india-news/story-123?a=1&b=2");
    }

    #[test]
    fn url_without_query_has_no_question_mark() {
        assert_eq!(
            normalize_url("https://example.in/a/b/?fbclid=xyz"),
            "https://example.in/a/b"
        );
    }

    #[test]
    fn garbage_url_falls_back_to_lowercase() {
        assert_eq!(normalize_url("  Not A Url/ "), "not a url");
    }

    #[test]
    fn hash_ignores_case_and_spacing() {
        let a = content_hash("Sensex  Rallies", "Body\n text");
        let b = content_hash("sensex rallies", "body text");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("sensex rallies", "other body"));
    }

    #[test]
    fn title_normalization_strips_punctuation() {
        assert_eq!(
            normalize_title("RBI holds repo rate at 6.5%: Governor"),
            "rbi holds repo rate at 6 5 governor"
        );
    }
}
