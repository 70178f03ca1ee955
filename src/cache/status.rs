//! Accounting of what a segment (or the whole cache) currently holds.

use serde::{Deserialize, Serialize};

/// Entry count plus the byte totals of keys and values.
///
/// Derived bookkeeping, never the source of truth: within one segment it is
/// kept in lockstep with the map under the segment's write lock, and the
/// cache-wide view is a sum of per-segment samples taken without global
/// coordination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub count: i64,
    pub key_size: i64,
    pub value_size: i64,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one entry's contribution.
    pub fn add_entry(&mut self, key: &str, value_len: usize) {
        self.count += 1;
        self.key_size += key.len() as i64;
        self.value_size += value_len as i64;
    }

    /// Removes one entry's contribution.
    pub fn sub_entry(&mut self, key: &str, value_len: usize) {
        self.count -= 1;
        self.key_size -= key.len() as i64;
        self.value_size -= value_len as i64;
    }

    /// Total bytes occupied by keys and values.
    pub fn entry_size(&self) -> i64 {
        self.key_size + self.value_size
    }

    /// Folds another sample into this one.
    pub fn merge(&mut self, other: &Status) {
        self.count += other.count;
        self.key_size += other.key_size;
        self.value_size += other.value_size;
    }
}
