//! A single cached value with its lifetime bookkeeping.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A ttl of zero means the entry never expires.
pub const NEVER_EXPIRES: i64 = 0;

/// One cached value: owned bytes, a ttl in seconds and the creation
/// timestamp used both for expiration and for LRU approximation.
///
/// The timestamp is atomic so readers can refresh it while holding only a
/// segment's read lock.
#[derive(Debug)]
pub struct Entry {
    data: Vec<u8>,
    ttl: i64,
    ctime: AtomicI64,
}

impl Entry {
    /// Wraps a copy of `data` with a creation timestamp of now.
    pub fn new(data: &[u8], ttl: i64) -> Self {
        Self {
            data: data.to_vec(),
            ttl,
            ctime: AtomicI64::new(now_unix()),
        }
    }

    /// Rebuilds an entry from a snapshot, keeping its original timestamp.
    pub(crate) fn restore(data: Vec<u8>, ttl: i64, ctime: i64) -> Self {
        Self {
            data,
            ttl,
            ctime: AtomicI64::new(ctime),
        }
    }

    /// Whether the entry is still live at the current wall-clock time.
    pub fn alive(&self) -> bool {
        self.ttl == NEVER_EXPIRES || now_unix() - self.ctime.load(Ordering::Relaxed) < self.ttl
    }

    /// Returns a copy of the value and refreshes the creation timestamp.
    ///
    /// The refresh is an unconditional swap, not a compare-and-swap:
    /// concurrent visitors race and the losing write may be slightly older
    /// than the winning one. Bounded skew is fine for approximate LRU and
    /// keeps readers from serializing on the timestamp.
    pub fn visit(&self) -> Vec<u8> {
        self.ctime.swap(now_unix(), Ordering::Relaxed);
        self.data.clone()
    }

    /// The raw value bytes, without touching the timestamp. Used by the
    /// snapshot encoder and by accounting.
    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn ttl(&self) -> i64 {
        self.ttl
    }

    pub(crate) fn ctime(&self) -> i64 {
        self.ctime.load(Ordering::Relaxed)
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
