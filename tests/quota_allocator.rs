// tests/quota_allocator.rs
//
// Allocator behavior through the public API:
// - priority fallthrough and the "priority 2 with budget 5" scenario
// - hard/soft limits under concurrent allocate/settle and record_usage
// - hour and day rollover driven by an injected clock

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use news_ingest_core::clock::{Clock, ManualClock};
use news_ingest_core::quota::budget::DEFAULT_HOURLY_BUDGET;
use news_ingest_core::quota::{NoSourceAvailable, ProviderQuota, QuotaAllocator};

fn quota(source: &str, priority: u32, ceiling: u32, used_today: u32, clock: &ManualClock) -> ProviderQuota {
    ProviderQuota {
        source: source.into(),
        daily_limit: ceiling + 10,
        hourly_limit: ceiling.max(1),
        conservative_limit: ceiling,
        priority,
        used_today,
        used_hour: 0,
        reserved: 0,
        errors_today: 0,
        last_error: None,
        last_reset: clock.now(),
        active: true,
        categories: vec![],
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::ist(2025, 6, 9, 10, 20).unwrap())
}

#[test]
fn exhausted_primary_falls_through_to_priority_two_with_budget_five() {
    let c = clock();
    let a = QuotaAllocator::from_quotas(
        vec![quota("primary", 1, 10, 10, &c), quota("secondary", 2, 5, 0, &c)],
        c.clone(),
        DEFAULT_HOURLY_BUDGET,
    );
    let alloc = a.next_source("general").expect("secondary has budget");
    assert_eq!(alloc.source, "secondary");
    assert_eq!(alloc.budget, 5);
}

#[test]
fn all_exhausted_yields_no_source() {
    let c = clock();
    let mut inactive = quota("off", 1, 10, 0, &c);
    inactive.active = false;
    let a = QuotaAllocator::from_quotas(
        vec![inactive, quota("spent", 2, 4, 4, &c)],
        c.clone(),
        DEFAULT_HOURLY_BUDGET,
    );
    assert_eq!(a.next_source("general"), Err(NoSourceAvailable));
    assert!(a.allocate("general", 3).is_err());
}

#[test]
fn next_source_never_returns_zero_budget() {
    let c = clock();
    let a = QuotaAllocator::from_quotas(vec![quota("only", 1, 3, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET);
    for _ in 0..3 {
        let alloc = a.next_source("general").unwrap();
        assert!(alloc.budget >= 1);
        assert!(a.record_usage(&alloc.source, 1, true));
    }
    assert_eq!(a.next_source("general"), Err(NoSourceAvailable));
}

#[test]
fn concurrent_leases_never_overgrant() {
    let c = clock();
    let a = Arc::new(QuotaAllocator::from_quotas(
        vec![quota("a", 1, 7, 0, &c), quota("b", 2, 5, 0, &c)],
        c.clone(),
        DEFAULT_HOURLY_BUDGET,
    ));

    let granted: u32 = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let a = a.clone();
                s.spawn(move || {
                    let mut total = 0;
                    while let Ok(lease) = a.allocate("general", 1) {
                        let g = lease.granted();
                        a.settle(lease, g, true, None);
                        total += g;
                    }
                    total
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(granted, 12);
    for q in a.snapshot().values() {
        assert!(q.used_today <= q.conservative_limit);
        assert!(q.used_hour <= q.hourly_limit);
        assert_eq!(q.reserved, 0);
    }
}

#[test]
fn concurrent_record_usage_respects_hard_limits() {
    let c = clock();
    let a = Arc::new(QuotaAllocator::from_quotas(vec![quota("a", 1, 20, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET));
    thread::scope(|s| {
        for _ in 0..8 {
            let a = a.clone();
            s.spawn(move || {
                for _ in 0..50 {
                    a.record_usage("a", 1, true);
                }
            });
        }
    });
    let q = &a.snapshot()["a"];
    assert_eq!(q.used_today, q.daily_limit);
    assert_eq!(q.used_hour, q.hourly_limit);
}

#[test]
fn hour_rollover_keeps_daily_usage() {
    let c = clock();
    let a = QuotaAllocator::from_quotas(vec![quota("a", 1, 10, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET);
    a.record_usage("a", 4, true);
    c.advance(Duration::minutes(45));
    assert_eq!(a.reset_if_due(), 1);
    let q = &a.snapshot()["a"];
    assert_eq!(q.used_hour, 0);
    assert_eq!(q.used_today, 4);

    // Same bucket again: nothing to do.
    c.advance(Duration::minutes(5));
    assert_eq!(a.reset_if_due(), 0);
}

#[test]
fn midnight_rollover_resets_both_counters() {
    let c = Arc::new(ManualClock::ist(2025, 6, 9, 23, 50).unwrap());
    let a = QuotaAllocator::from_quotas(vec![quota("a", 1, 10, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET);
    a.record_usage("a", 6, false);
    c.advance(Duration::minutes(15));
    let q = &a.snapshot()["a"];
    // snapshot does not reset; the next allocation does.
    assert_eq!(q.used_today, 6);
    let alloc = a.next_source("general").unwrap();
    assert_eq!(alloc.budget, 10);
    let q = &a.snapshot()["a"];
    assert_eq!((q.used_today, q.used_hour, q.errors_today), (0, 0, 0));
}

#[test]
fn missed_ticks_reset_once() {
    let c = clock();
    let a = QuotaAllocator::from_quotas(vec![quota("a", 1, 10, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET);
    a.record_usage("a", 3, true);
    c.advance(Duration::hours(5));
    assert_eq!(a.reset_if_due(), 1);
    a.record_usage("a", 2, true);
    assert_eq!(a.reset_if_due(), 0);
    let q = &a.snapshot()["a"];
    assert_eq!((q.used_today, q.used_hour), (5, 2));
}

#[test]
fn advisory_budget_follows_ist_hour() {
    let c = Arc::new(ManualClock::ist(2025, 6, 9, 3, 0).unwrap());
    let a = QuotaAllocator::from_quotas(vec![quota("a", 1, 10, 0, &c)], c.clone(), DEFAULT_HOURLY_BUDGET);
    assert_eq!(a.current_hourly_budget(), DEFAULT_HOURLY_BUDGET[3]);
    c.advance(Duration::hours(16));
    assert_eq!(a.current_hourly_budget(), DEFAULT_HOURLY_BUDGET[19]);
}
