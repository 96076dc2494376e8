// src/cache/config.rs
//! Static TTL table and the local-time windows the TTL rules are evaluated in.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How a category picks between its three TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlRule {
    /// Event TTL during the live-event window (evening matches), peak otherwise.
    LiveEvent,
    /// Event TTL during trading hours, off-peak after close.
    Market,
    /// Always the event TTL.
    Breaking,
    /// Peak TTL in business hours, off-peak otherwise.
    Standard,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryTtl {
    pub peak_secs: u64,
    pub off_peak_secs: u64,
    pub event_secs: u64,
    /// Monitoring target only, never enforced.
    #[serde(default)]
    pub target_hit_rate: f64,
    pub rule: TtlRule,
}

impl CategoryTtl {
    fn new(rule: TtlRule, peak: u64, off_peak: u64, event: u64, target: f64) -> Self {
        Self {
            peak_secs: peak,
            off_peak_secs: off_peak,
            event_secs: event,
            target_hit_rate: target,
            rule,
        }
    }

    pub fn peak(&self) -> Duration {
        Duration::from_secs(self.peak_secs)
    }
    pub fn off_peak(&self) -> Duration {
        Duration::from_secs(self.off_peak_secs)
    }
    pub fn event(&self) -> Duration {
        Duration::from_secs(self.event_secs)
    }
}

/// Local wall-clock window, `"HH:MM"` bounds, end exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub weekdays_only: bool,
}

impl TimeWindow {
    pub fn new(start: &str, end: &str, weekdays_only: bool) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            weekdays_only,
        }
    }

    fn bounds(&self) -> Option<(NaiveTime, NaiveTime)> {
        let s = NaiveTime::parse_from_str(self.start.trim(), "%H:%M").ok()?;
        let e = NaiveTime::parse_from_str(self.end.trim(), "%H:%M").ok()?;
        Some((s, e))
    }

    pub fn is_valid(&self) -> bool {
        self.bounds().is_some()
    }

    /// Whether `now` (already in the target offset) falls inside the window.
    /// Windows whose end precedes their start wrap past midnight.
    pub fn contains(&self, now: DateTime<FixedOffset>) -> bool {
        let Some((start, end)) = self.bounds() else {
            return false;
        };
        if self.weekdays_only && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = now.time();
        if start <= end {
            t >= start && t < end
        } else {
            t >= start || t < end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub categories: BTreeMap<String, CategoryTtl>,
    pub business_hours: TimeWindow,
    pub market_hours: TimeWindow,
    pub live_event_hours: TimeWindow,
    /// Unknown categories during business hours.
    pub fallback_business_secs: u64,
    /// Unknown categories outside business hours.
    pub fallback_off_hours_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        use TtlRule::*;
        let mut categories = BTreeMap::new();
        for (name, ttl) in [
            ("breaking", CategoryTtl::new(Breaking, 300, 600, 120, 0.60)),
            ("sports", CategoryTtl::new(LiveEvent, 900, 1800, 180, 0.75)),
            ("business", CategoryTtl::new(Market, 900, 3600, 300, 0.80)),
            ("markets", CategoryTtl::new(Market, 600, 3600, 180, 0.75)),
            ("general", CategoryTtl::new(Standard, 900, 2700, 600, 0.85)),
            ("politics", CategoryTtl::new(Standard, 900, 2700, 600, 0.80)),
            ("technology", CategoryTtl::new(Standard, 1800, 3600, 900, 0.85)),
            ("entertainment", CategoryTtl::new(Standard, 1800, 3600, 900, 0.90)),
            ("health", CategoryTtl::new(Standard, 1800, 5400, 900, 0.90)),
            ("science", CategoryTtl::new(Standard, 3600, 7200, 1800, 0.90)),
        ] {
            categories.insert(name.to_string(), ttl);
        }
        Self {
            categories,
            business_hours: TimeWindow::new("09:00", "18:00", false),
            market_hours: TimeWindow::new("09:15", "15:30", true),
            live_event_hours: TimeWindow::new("19:00", "23:30", false),
            fallback_business_secs: 600,
            fallback_off_hours_secs: 1800,
        }
    }
}

impl CacheConfig {
    pub fn category(&self, name: &str) -> Option<&CategoryTtl> {
        self.categories.get(&name.trim().to_ascii_lowercase())
    }
}
