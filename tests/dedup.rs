// tests/dedup.rs
//
// Dedup decision order and the time-window gate, through the public API.

use chrono::{DateTime, Duration, TimeZone, Utc};
use news_ingest_core::dedup::{DedupIndex, Deduplicator, DetectionMethod, Fingerprint};
use news_ingest_core::ingest::types::RawArticle;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
}

fn raw(url: &str, title: &str, body: &str, published: DateTime<Utc>) -> RawArticle {
    RawArticle {
        external_id: None,
        title: title.into(),
        description: String::new(),
        body: body.into(),
        url: url.into(),
        source_name: "Test Wire".into(),
        author: None,
        published_at: Some(published),
        category_hint: Some("general".into()),
    }
}

#[test]
fn identical_normalized_urls_are_duplicates_regardless_of_title() {
    let d = Deduplicator::default();
    let mut idx = DedupIndex::default();
    let (keep, dups) = d.partition(
        vec![
            raw("https://www.thehindu.com/news/story-1/?utm_source=tw", "Budget session opens", "a", at(9, 4)),
            raw("http://thehindu.com/news/story-1#comments", "Completely different headline", "b", at(2, 4)),
        ],
        &mut idx,
    );
    assert_eq!(keep.len(), 1);
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].method, DetectionMethod::UrlExact);
    assert!(dups[0].signals.url_match);
}

#[test]
fn near_identical_titles_ten_days_apart_are_not_duplicates() {
    let d = Deduplicator::default();
    let mut idx = DedupIndex::default();
    let first = raw(
        "https://a.in/1",
        "Heavy rain lashes Mumbai, local trains disrupted",
        "one",
        at(1, 6),
    );
    let later = raw(
        "https://b.in/2",
        "Heavy rain lashes Mumbai; local trains disrupted!",
        "two",
        at(1, 6) + Duration::days(10),
    );
    let (keep, dups) = d.partition(vec![first, later], &mut idx);
    assert_eq!(keep.len(), 2);
    assert!(dups.is_empty());

    let verdict = d.classify(&Fingerprint::of_raw(&keep[1].0), &DedupIndex::default());
    assert_eq!(verdict.method, DetectionMethod::Original);
}

#[test]
fn snapshot_is_read_only_but_accepted_items_count() {
    let d = Deduplicator::default();
    let mut idx = DedupIndex::default();
    let a = raw("https://x.in/a", "Sensex closes at record high", "markets", at(9, 5));
    let (keep, _) = d.partition(vec![a.clone(), a.clone(), a], &mut idx);
    assert_eq!(keep.len(), 1);
    assert_eq!(idx.snapshot_len(), 0);
    assert_eq!(idx.accepted_len(), 1);
}

#[test]
fn known_urls_outside_snapshot_are_duplicates() {
    let d = Deduplicator::default();
    let mut idx = DedupIndex::default();
    idx.add_known_url("https://old.in/archive/1");
    let (keep, dups) = d.partition(
        vec![raw("https://www.old.in/archive/1/", "Old story", "x", at(9, 1))],
        &mut idx,
    );
    assert!(keep.is_empty());
    assert_eq!(dups[0].method, DetectionMethod::UrlExact);
}
