// src/ingest/scheduler.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ingest::IngestionOrchestrator;
use crate::quota::QuotaAllocator;

/// Full refresh every `interval`. The first tick fires immediately.
pub fn spawn_refresh_scheduler(orchestrator: Arc<IngestionOrchestrator>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match orchestrator.trigger_full_refresh().await {
                Ok(reports) => {
                    let kept: usize = reports.iter().map(|r| r.kept).sum();
                    tracing::info!(target: "ingest", passes = reports.len(), kept, "refresh tick");
                }
                Err(e) => tracing::warn!(target: "ingest", error = %e, "refresh tick failed"),
            }
        }
    })
}

/// Quota reset check every `interval`. Resets are bucket-guarded, so the tick
/// frequency only bounds how stale the gauges can get. When `ledger` is set
/// the quota ledger is saved after each tick.
pub fn spawn_reset_tick(allocator: Arc<QuotaAllocator>, interval: Duration, ledger: Option<PathBuf>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let reset = allocator.reset_if_due();
            if reset > 0 {
                tracing::debug!(target: "quota", sources = reset, "reset tick applied");
            }
            if let Some(path) = &ledger {
                if let Err(e) = allocator.save_ledger(path) {
                    tracing::warn!(target: "quota", error = ?e, path = %path.display(), "ledger save failed");
                }
            }
        }
    })
}
