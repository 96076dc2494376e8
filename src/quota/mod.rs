// src/quota/mod.rs
//! Provider quota ledger and allocator.
//!
//! The allocator owns one `ProviderQuota` per source, each behind its own
//! lock, so concurrent passes racing on one source serialize while different
//! sources never block each other. Sources are kept in priority order and
//! locked one at a time.
//!
//! Invariants held under any number of concurrent callers:
//! - `used_today <= daily_limit` and `used_hour <= hourly_limit` (hard caps)
//! - grants never exceed `conservative_limit - used_today - reserved`
//!   or `hourly_limit - used_hour - reserved`

pub mod budget;
pub mod ledger;
pub mod reset;

use chrono::{DateTime, FixedOffset};
use metrics::gauge;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::config::{IngestConfig, ProviderConfig};

use self::reset::{apply_reset, ResetKind};

/// Per-source usage ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderQuota {
    pub source: String,
    pub daily_limit: u32,
    pub hourly_limit: u32,
    pub conservative_limit: u32,
    /// 1 = tried first.
    pub priority: u32,
    pub used_today: u32,
    pub used_hour: u32,
    /// Units granted to in-flight passes and not yet settled.
    #[serde(default)]
    pub reserved: u32,
    #[serde(default)]
    pub errors_today: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub last_reset: DateTime<FixedOffset>,
    pub active: bool,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ProviderQuota {
    pub fn from_config(cfg: &ProviderConfig, now: DateTime<FixedOffset>) -> Self {
        Self {
            source: cfg.id.clone(),
            daily_limit: cfg.daily_limit,
            hourly_limit: cfg.hourly_limit,
            conservative_limit: cfg.conservative_limit.min(cfg.daily_limit),
            priority: cfg.priority,
            used_today: 0,
            used_hour: 0,
            reserved: 0,
            errors_today: 0,
            last_error: None,
            last_reset: now,
            active: cfg.active,
            categories: cfg.categories.clone(),
        }
    }

    /// Requests still available this hour under both the hourly limit and
    /// the conservative daily ceiling.
    pub fn remaining(&self) -> u32 {
        let hour_left = self
            .hourly_limit
            .saturating_sub(self.used_hour)
            .saturating_sub(self.reserved);
        let day_left = self
            .conservative_limit
            .saturating_sub(self.used_today)
            .saturating_sub(self.reserved);
        hour_left.min(day_left)
    }

    pub fn serves(&self, category: &str) -> bool {
        self.categories.is_empty()
            || self
                .categories
                .iter()
                .any(|c| c.eq_ignore_ascii_case(category))
    }

    pub fn is_eligible(&self, category: &str) -> bool {
        self.active && self.serves(category) && self.remaining() >= 1
    }

    /// Add `count` requests, never past the hard limits.
    fn add_usage(&mut self, count: u32) -> bool {
        let want_day = self.used_today.saturating_add(count);
        let want_hour = self.used_hour.saturating_add(count);
        self.used_today = want_day.min(self.daily_limit);
        self.used_hour = want_hour.min(self.hourly_limit);
        want_day > self.daily_limit || want_hour > self.hourly_limit
    }
}

/// Returned when every provider is inactive, unsuitable or out of quota.
/// This is an expected condition, not a failure to retry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("no provider has quota left")]
pub struct NoSourceAvailable;

/// Read-only answer of `next_source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub source: String,
    pub budget: u32,
}

/// Reserved budget on one source. Hand it back through
/// `QuotaAllocator::settle` once the call finishes. A lease dropped without
/// being settled (cancelled pass) releases its reservation and records no usage.
#[must_use = "a lease keeps quota reserved until settled"]
pub struct Lease {
    slot: Arc<Mutex<ProviderQuota>>,
    source: String,
    granted: u32,
    settled: bool,
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("source", &self.source)
            .field("granted", &self.granted)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut q = self.slot.lock();
        q.reserved = q.reserved.saturating_sub(self.granted);
        tracing::debug!(
            target: "quota",
            source = %self.source,
            granted = self.granted,
            "unsettled lease released"
        );
    }
}

impl Lease {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn granted(&self) -> u32 {
        self.granted
    }
}

pub struct QuotaAllocator {
    slots: Vec<Arc<Mutex<ProviderQuota>>>,
    clock: Arc<dyn Clock>,
    hourly_budget: [u32; 24],
}

impl std::fmt::Debug for QuotaAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaAllocator")
            .field("sources", &self.slots.len())
            .finish()
    }
}

impl QuotaAllocator {
    pub fn new(providers: &[ProviderConfig], clock: Arc<dyn Clock>, hourly_budget: [u32; 24]) -> Self {
        let now = clock.now();
        let mut quotas: Vec<ProviderQuota> = providers
            .iter()
            .map(|p| ProviderQuota::from_config(p, now))
            .collect();
        quotas.sort_by_key(|q| q.priority);
        Self {
            slots: quotas.into_iter().map(|q| Arc::new(Mutex::new(q))).collect(),
            clock,
            hourly_budget,
        }
    }

    pub fn from_config(cfg: &IngestConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(&cfg.providers, clock, cfg.hourly_budget_table())
    }

    /// Build directly from ledger entries (tests, restores).
    pub fn from_quotas(
        mut quotas: Vec<ProviderQuota>,
        clock: Arc<dyn Clock>,
        hourly_budget: [u32; 24],
    ) -> Self {
        quotas.sort_by_key(|q| q.priority);
        Self {
            slots: quotas.into_iter().map(|q| Arc::new(Mutex::new(q))).collect(),
            clock,
            hourly_budget,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// First eligible source by priority and its remaining budget this hour.
    /// Does not reserve anything.
    pub fn next_source(&self, category: &str) -> Result<Allocation, NoSourceAvailable> {
        let now = self.clock.now();
        for slot in &self.slots {
            let mut q = slot.lock();
            let kind = apply_reset(&mut q, now);
            log_reset(&q.source, kind);
            if q.is_eligible(category) {
                return Ok(Allocation {
                    source: q.source.clone(),
                    budget: q.remaining(),
                });
            }
        }
        Err(NoSourceAvailable)
    }

    /// Pick the first eligible source and reserve up to `cap` requests on it.
    /// The pick and the reservation happen under the same lock.
    pub fn allocate(&self, category: &str, cap: u32) -> Result<Lease, NoSourceAvailable> {
        if cap == 0 {
            return Err(NoSourceAvailable);
        }
        let now = self.clock.now();
        for slot in &self.slots {
            let mut q = slot.lock();
            let kind = apply_reset(&mut q, now);
            log_reset(&q.source, kind);
            if !q.is_eligible(category) {
                tracing::debug!(
                    target: "quota",
                    source = %q.source,
                    category,
                    remaining = q.remaining(),
                    active = q.active,
                    "source skipped"
                );
                continue;
            }
            let granted = q.remaining().min(cap);
            q.reserved = q.reserved.saturating_add(granted);
            return Ok(Lease {
                slot: Arc::clone(slot),
                source: q.source.clone(),
                granted,
                settled: false,
            });
        }
        tracing::info!(target: "quota", category, "all sources exhausted");
        Err(NoSourceAvailable)
    }

    /// Release a lease and record what the call actually consumed.
    pub fn settle(&self, mut lease: Lease, used: u32, success: bool, error: Option<String>) {
        lease.settled = true;
        let mut q = lease.slot.lock();
        q.reserved = q.reserved.saturating_sub(lease.granted);
        self.apply_usage(&mut q, used, success, error);
    }

    /// Increment usage counters for `source`. Returns false for unknown sources.
    pub fn record_usage(&self, source: &str, count: u32, success: bool) -> bool {
        for slot in &self.slots {
            let mut q = slot.lock();
            if q.source == source {
                let err = (!success).then(|| "call failed".to_string());
                self.apply_usage(&mut q, count, success, err);
                return true;
            }
        }
        false
    }

    fn apply_usage(&self, q: &mut ProviderQuota, count: u32, success: bool, error: Option<String>) {
        let kind = apply_reset(q, self.clock.now());
        log_reset(&q.source, kind);
        if q.add_usage(count) {
            tracing::warn!(
                target: "quota",
                source = %q.source,
                count,
                "usage clamped at hard limit"
            );
        }
        if !success {
            q.errors_today = q.errors_today.saturating_add(1);
            q.last_error = error;
        }
        gauge!("quota_used_today", "source" => q.source.clone()).set(q.used_today as f64);
        gauge!("quota_used_hour", "source" => q.source.clone()).set(q.used_hour as f64);
    }

    /// Advisory total for the current hour in the target locale.
    pub fn current_hourly_budget(&self) -> u32 {
        budget::current_hourly_budget(&self.hourly_budget, self.clock.now())
    }

    /// Requests spent or in flight this hour across all sources.
    pub fn requests_this_hour(&self) -> u32 {
        let now = self.clock.now();
        self.slots
            .iter()
            .map(|slot| {
                let mut q = slot.lock();
                let kind = apply_reset(&mut q, now);
                log_reset(&q.source, kind);
                q.used_hour.saturating_add(q.reserved)
            })
            .sum()
    }

    /// Scheduled tick: reset counters whose hour/day bucket has passed.
    /// Returns how many sources were reset.
    pub fn reset_if_due(&self) -> usize {
        let now = self.clock.now();
        self.slots
            .iter()
            .filter(|slot| {
                let mut q = slot.lock();
                let kind = apply_reset(&mut q, now);
                log_reset(&q.source, kind);
                kind != ResetKind::None
            })
            .count()
    }

    pub fn set_active(&self, source: &str, active: bool) -> bool {
        for slot in &self.slots {
            let mut q = slot.lock();
            if q.source == source {
                q.active = active;
                return true;
            }
        }
        false
    }

    pub fn snapshot(&self) -> BTreeMap<String, ProviderQuota> {
        self.slots
            .iter()
            .map(|slot| {
                let q = slot.lock();
                (q.source.clone(), q.clone())
            })
            .collect()
    }

    /// Copy persisted counters onto matching sources, then run the reset
    /// check so counters from an earlier hour/day do not linger.
    pub fn restore(&self, saved: &BTreeMap<String, ProviderQuota>) -> usize {
        let now = self.clock.now();
        let mut restored = 0;
        for slot in &self.slots {
            let mut q = slot.lock();
            if let Some(s) = saved.get(&q.source) {
                q.used_today = s.used_today.min(q.daily_limit);
                q.used_hour = s.used_hour.min(q.hourly_limit);
                q.errors_today = s.errors_today;
                q.last_error = s.last_error.clone();
                q.last_reset = s.last_reset;
                apply_reset(&mut q, now);
                restored += 1;
            }
        }
        restored
    }
}

fn log_reset(source: &str, kind: ResetKind) {
    match kind {
        ResetKind::None => {}
        ResetKind::Hour => tracing::info!(target: "quota", source, "hourly counters reset"),
        ResetKind::Day => tracing::info!(target: "quota", source, "daily counters reset"),
    }
}
