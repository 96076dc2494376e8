// src/quota/budget.rs
//! Advisory hourly request budget keyed by hour-of-day in the target locale.
//!
//! Requests concentrate around market open (09:00-10:00 IST), the midday
//! peak and evening prime time, and taper overnight. The value caps how hard
//! the orchestrator pulls across all providers in one hour; per-source limits
//! are enforced separately by the allocator.

use chrono::{DateTime, FixedOffset, Timelike};

pub const DEFAULT_HOURLY_BUDGET: [u32; 24] = [
    2, 1, 1, 1, 1, 2, // 00-05 overnight
    4, 6, 8, // 06-08 morning ramp
    12, 10, 10, // 09-11 market open
    12, 12, 10, 10, // 12-15 midday peak, market close
    8, 8, 10, // 16-18
    14, 14, 12, // 19-21 prime time
    6, 4, // 22-23
];

/// Recommended total request count for the hour containing `now`.
pub fn current_hourly_budget(table: &[u32; 24], now: DateTime<FixedOffset>) -> u32 {
    table[now.hour() as usize % 24]
}
