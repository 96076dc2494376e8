//! # Clock
//! Injected wall clock in the target locale.
//!
//! Quota hour/day buckets and cache TTL windows are all evaluated against
//! `Clock::now()`, so tests can move time around with `ManualClock` instead of
//! sleeping or patching the system time.

use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};
use parking_lot::Mutex;

/// India Standard Time, UTC+05:30.
pub const IST_OFFSET_MINUTES: i32 = 330;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Build a fixed offset from minutes east of UTC, falling back to IST when the
/// value is outside chrono's accepted range.
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .or_else(|| FixedOffset::east_opt(IST_OFFSET_MINUTES * 60))
        .unwrap_or_else(|| Utc.fix())
}

/// Real wall clock, rendered in the configured offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn ist() -> Self {
        Self::new(offset_from_minutes(IST_OFFSET_MINUTES))
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::ist()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Convenience: a clock at the given IST wall time.
    /// Returns `None` for impossible dates.
    pub fn ist(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        let tz = offset_from_minutes(IST_OFFSET_MINUTES);
        tz.with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(Self::new)
    }

    pub fn set(&self, t: DateTime<FixedOffset>) {
        *self.now.lock() = t;
    }

    pub fn advance(&self, by: Duration) {
        let mut g = self.now.lock();
        *g += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock()
    }
}
