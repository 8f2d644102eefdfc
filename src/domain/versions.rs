//! Per-symbol update counters used as a staleness signal.

use std::collections::HashMap;

/// Monotonic per-symbol counters. A symbol that was never updated reports 0.
#[derive(Debug, Clone, Default)]
pub struct UpdateVersions {
    counts: HashMap<String, u64>,
}

impl UpdateVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self, symbol: &str) -> u64 {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn bump(&mut self, symbol: &str) -> u64 {
        let count = self.counts.entry(symbol.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}
