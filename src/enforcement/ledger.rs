// Warning ledger: per-(scope, subject) violation counts, in memory only.
//
// Backed by a DashMap so each key's read-modify-write happens under that
// key's shard lock. Counts never decay; a process restart resets them.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Composite ledger key. A struct rather than a formatted string, so
/// `(1, 23)` and `(12, 3)` can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WarningKey {
    /// The enclosing community (guild, server, channel group)
    pub scope_id: u64,
    /// The user accumulating warnings
    pub subject_id: u64,
}

impl WarningKey {
    pub fn new(scope_id: u64, subject_id: u64) -> Self {
        Self {
            scope_id,
            subject_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct WarningLedger {
    counts: DashMap<WarningKey, u64>,
}

impl WarningLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more warning and return the new count.
    pub fn increment(&self, scope_id: u64, subject_id: u64) -> u64 {
        let mut count = self
            .counts
            .entry(WarningKey::new(scope_id, subject_id))
            .or_insert(0);
        *count += 1;
        *count
    }

    /// Current count, 0 for a subject with no warnings.
    pub fn get(&self, scope_id: u64, subject_id: u64) -> u64 {
        self.counts
            .get(&WarningKey::new(scope_id, subject_id))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Forget one subject's warnings. Returns whether there were any.
    pub fn clear(&self, scope_id: u64, subject_id: u64) -> bool {
        let removed = self
            .counts
            .remove(&WarningKey::new(scope_id, subject_id))
            .is_some();
        debug!(scope_id, subject_id, removed, "Cleared warnings");
        removed
    }

    /// Forget every subject's warnings in a scope. Returns how many keys were removed.
    pub fn clear_scope(&self, scope_id: u64) -> usize {
        let mut removed = 0;
        self.counts.retain(|key, _| {
            let keep = key.scope_id != scope_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        debug!(scope_id, removed, "Cleared scope warnings");
        removed
    }

    /// Number of tracked (scope, subject) pairs.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
