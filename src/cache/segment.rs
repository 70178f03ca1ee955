//! One shard of the store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::entry::Entry;
use crate::cache::status::Status;
use crate::config::Config;
use crate::error::{Error, Result};

/// Map plus accounting, guarded together by one reader/writer lock so the
/// totals always match the live entries whenever the write side is free.
struct SegmentInner {
    map: HashMap<String, Entry>,
    status: Status,
}

/// An independently locked shard. Many readers or one writer; the lock is
/// never held across an await point.
pub(crate) struct Segment {
    inner: RwLock<SegmentInner>,
    config: Arc<Config>,
}

impl Segment {
    pub(crate) fn new(config: Arc<Config>) -> Self {
        Self {
            inner: RwLock::new(SegmentInner {
                map: HashMap::with_capacity(config.map_size_of_segment),
                status: Status::new(),
            }),
            config,
        }
    }

    /// Looks up a key under the read side. An expired entry is evicted on
    /// the spot: the read lock is released, the removal runs under the
    /// write side (a no-op if another writer got there first), and the
    /// caller sees a miss. A live entry is copied out and touched.
    pub(crate) fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let inner = self.inner.read();
            match inner.map.get(key) {
                None => return None,
                Some(entry) if entry.alive() => return Some(entry.visit()),
                Some(_) => {}
            }
        }
        self.delete(key);
        None
    }

    /// Installs a value under the write side, enforcing the per-segment
    /// budget. When the key already exists its contribution is subtracted
    /// first; a refused write restores the accounting and leaves the old
    /// entry untouched.
    pub(crate) fn set(&self, key: &str, value: &[u8], ttl: i64) -> Result<()> {
        let mut inner = self.inner.write();
        let SegmentInner { map, status } = &mut *inner;

        let old_len = map.get(key).map(|old| old.data().len());
        if let Some(len) = old_len {
            status.sub_entry(key, len);
        }

        let after = status.entry_size() + key.len() as i64 + value.len() as i64;
        if after > self.config.segment_budget() as i64 {
            if let Some(len) = old_len {
                status.add_entry(key, len);
            }
            return Err(Error::CapacityExceeded);
        }

        status.add_entry(key, value.len());
        map.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    /// Removes a key under the write side, if present.
    pub(crate) fn delete(&self, key: &str) {
        let mut inner = self.inner.write();
        let SegmentInner { map, status } = &mut *inner;
        if let Some(old) = map.remove(key) {
            status.sub_entry(key, old.data().len());
        }
    }

    /// A copy of the accounting, taken under the read side.
    pub(crate) fn status(&self) -> Status {
        self.inner.read().status.clone()
    }

    /// Sweeps expired entries under the write side, stopping after
    /// `max_gc_count` removals; leftovers wait for the next pass. Returns
    /// how many entries were removed.
    pub(crate) fn gc(&self) -> usize {
        let max_gc_count = self.config.max_gc_count;
        let mut inner = self.inner.write();
        let SegmentInner { map, status } = &mut *inner;

        let mut removed = 0;
        map.retain(|key, entry| {
            if removed >= max_gc_count || entry.alive() {
                return true;
            }
            status.sub_entry(key, entry.data().len());
            removed += 1;
            false
        });
        removed
    }

    /// Visits every entry under the read side. Used by the snapshot
    /// encoder while the dumping flag keeps new mutators out.
    pub(crate) fn for_each_entry(&self, mut visit: impl FnMut(&str, &Entry)) {
        let inner = self.inner.read();
        for (key, entry) in &inner.map {
            visit(key, entry);
        }
    }

    /// Reinserts a recovered entry with its original timestamp, bypassing
    /// admission. Snapshot entries were admitted when first written.
    pub(crate) fn restore(&self, key: String, entry: Entry) {
        let mut inner = self.inner.write();
        let SegmentInner { map, status } = &mut *inner;
        status.add_entry(&key, entry.data().len());
        map.insert(key, entry);
    }
}
