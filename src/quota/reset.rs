// src/quota/reset.rs
//! Wall-clock bucket comparison for hourly/daily counter resets.
//!
//! A reset happens only when the (date, hour) bucket of `now` is later than
//! the bucket of `last_reset`, so a late or repeated tick never resets twice
//! and a tick missed while the process was down still resets on the next one.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};

use super::ProviderQuota;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    None,
    Hour,
    Day,
}

fn bucket(t: DateTime<FixedOffset>) -> (NaiveDate, u32) {
    (t.date_naive(), t.hour())
}

/// Which reset (if any) is due, comparing both times in `now`'s offset.
pub fn reset_due(last_reset: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> ResetKind {
    let (last_day, last_hour) = bucket(last_reset.with_timezone(now.offset()));
    let (day, hour) = bucket(now);
    if day > last_day {
        ResetKind::Day
    } else if day == last_day && hour > last_hour {
        ResetKind::Hour
    } else {
        ResetKind::None
    }
}

/// Apply a due reset to one ledger entry. In-flight reservations survive.
pub fn apply_reset(q: &mut ProviderQuota, now: DateTime<FixedOffset>) -> ResetKind {
    let kind = reset_due(q.last_reset, now);
    match kind {
        ResetKind::None => {}
        ResetKind::Hour => {
            q.used_hour = 0;
            q.last_reset = now;
        }
        ResetKind::Day => {
            q.used_hour = 0;
            q.used_today = 0;
            q.errors_today = 0;
            q.last_reset = now;
        }
    }
    kind
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::Duration;

    #[test]
    fn same_hour_is_not_due() {
        let c = ManualClock::ist(2025, 1, 10, 14, 5).unwrap();
        let last = c.now();
        c.advance(Duration::minutes(40));
        assert_eq!(reset_due(last, c.now()), ResetKind::None);
    }

    #[test]
    fn hour_and_day_boundaries() {
        let c = ManualClock::ist(2025, 1, 10, 23, 50).unwrap();
        let last = c.now();
        c.advance(Duration::minutes(5));
        assert_eq!(reset_due(last, c.now()), ResetKind::None);
        c.advance(Duration::minutes(10));
        assert_eq!(reset_due(last, c.now()), ResetKind::Day);
    }

    #[test]
    fn clock_going_backwards_does_not_reset() {
        let c = ManualClock::ist(2025, 1, 10, 12, 0).unwrap();
        let last = c.now();
        c.advance(Duration::hours(-3));
        assert_eq!(reset_due(last, c.now()), ResetKind::None);
    }

    #[test]
    fn buckets_compare_in_target_offset() {
        // 18:45 UTC on the 10th is 00:15 IST on the 11th.
        let utc = chrono::FixedOffset::east_opt(0).unwrap();
        let last = chrono::TimeZone::with_ymd_and_hms(&utc, 2025, 1, 10, 18, 0, 0).unwrap();
        let now = ManualClock::ist(2025, 1, 11, 0, 15).unwrap().now();
        // 18:00 UTC == 23:30 IST on the 10th, so a day rollover is due.
        assert_eq!(reset_due(last, now), ResetKind::Day);
    }
}
