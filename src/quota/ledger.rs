// src/quota/ledger.rs
//! Best-effort JSON snapshot of the quota ledger, so a restart inside the
//! same hour/day does not hand out a fresh quota. Writes go through a temp
//! file and a rename.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::{ProviderQuota, QuotaAllocator};

impl QuotaAllocator {
    pub fn save_ledger(&self, path: &Path) -> Result<()> {
        let mut snapshot = self.snapshot();
        // In-flight reservations belong to this process only.
        for q in snapshot.values_mut() {
            q.reserved = 0;
        }
        let json = serde_json::to_string_pretty(&snapshot).context("serializing quota ledger")?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating ledger dir {}", dir.display()))?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())?;
        fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }

    /// Restore counters from a snapshot file. A missing file is not an error.
    pub fn restore_ledger(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading quota ledger {}", path.display()))?;
        let saved: BTreeMap<String, ProviderQuota> =
            serde_json::from_str(&s).context("parsing quota ledger")?;
        let n = self.restore(&saved);
        tracing::info!(target: "quota", restored = n, path = %path.display(), "quota ledger restored");
        Ok(n)
    }
}
