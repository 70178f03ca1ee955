//! The cache itself: segment fan-out, dump coordination and the
//! background GC / dump tasks.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::dump::DumpImage;
use crate::cache::segment::Segment;
use crate::cache::status::Status;
use crate::config::Config;
use crate::error::{Error, Result};

/// Sharded, TTL-aware in-memory store.
///
/// The segment array is fixed for the lifetime of the cache and there is
/// no global lock on the hot path; the only cache-wide synchronization is
/// the `dumping` flag that parks operations while a snapshot is encoded.
pub struct Cache {
    segments: Vec<Arc<Segment>>,
    mask: u32,
    config: Arc<Config>,
    dumping: AtomicU32,
}

impl Cache {
    /// Builds an empty cache. The segment count must be a power of two so
    /// the segment index can be taken with a mask.
    pub fn new(config: Config) -> Result<Self> {
        if config.segment_count == 0 || !config.segment_count.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "segment_count must be a power of two, got {}",
                config.segment_count
            )));
        }

        let config = Arc::new(config);
        let segments = (0..config.segment_count)
            .map(|_| Arc::new(Segment::new(Arc::clone(&config))))
            .collect();

        Ok(Self {
            segments,
            mask: config.segment_count as u32 - 1,
            config,
            dumping: AtomicU32::new(0),
        })
    }

    /// Builds a cache from the dump file if one is present and decodes,
    /// otherwise starts empty with the passed config. Decode failures are
    /// deliberately quiet; a cache node must come up either way.
    pub fn recover(config: Config) -> Result<Self> {
        match DumpImage::load(&config.dump_file).and_then(DumpImage::into_cache) {
            Ok(cache) => Ok(cache),
            Err(err) => {
                debug!("starting empty, no usable dump: {err}");
                Cache::new(config)
            }
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieves a copy of the value for `key`, or `None` on a miss or an
    /// expired entry.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.wait_for_dumping().await;
        self.segment_of(key).get(key)
    }

    /// Stores a copy of `value` under `key` with the given ttl in seconds
    /// (zero meaning never expire). Fails with `CapacityExceeded` when the
    /// write would push the segment past its budget, leaving the prior
    /// state intact.
    pub async fn set(&self, key: &str, value: &[u8], ttl: i64) -> Result<()> {
        self.wait_for_dumping().await;
        self.segment_of(key).set(key, value, ttl)
    }

    /// Removes `key`, if present.
    pub async fn delete(&self, key: &str) {
        self.wait_for_dumping().await;
        self.segment_of(key).delete(key);
    }

    /// Sums the per-segment accounting. Each segment's sample is taken
    /// under its read lock, but the segments are sampled one after another
    /// without global coordination, so the total is not a point-in-time
    /// snapshot of the whole cache.
    pub async fn status(&self) -> Status {
        self.wait_for_dumping().await;
        let mut total = Status::new();
        for segment in &self.segments {
            total.merge(&segment.status());
        }
        total
    }

    /// Runs a GC pass over every segment concurrently and waits for all of
    /// them. Returns the total number of removed entries.
    pub async fn gc(&self) -> usize {
        self.wait_for_dumping().await;
        let mut handles = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let segment = Arc::clone(segment);
            handles.push(tokio::spawn(async move { segment.gc() }));
        }

        let mut removed = 0;
        for handle in handles {
            if let Ok(count) = handle.await {
                removed += count;
            }
        }
        removed
    }

    /// Encodes the whole cache to the configured dump file, excluding
    /// mutators for the duration via the dumping flag.
    pub async fn dump(&self) -> Result<()> {
        self.dumping.store(1, Ordering::Release);
        let image = DumpImage::snapshot(self);
        let result = image.persist(&self.config.dump_file);
        self.dumping.store(0, Ordering::Release);
        result
    }

    /// Spawns the periodic GC task. Aborting the handle stops it.
    pub fn spawn_gc_task(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = Duration::from_secs((cache.config.gc_duration * 60).max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = cache.gc().await;
                debug!("gc pass removed {removed} expired entries");
            }
        })
    }

    /// Spawns the periodic dump task. Aborting the handle stops it.
    pub fn spawn_dump_task(self: &Arc<Self>) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        let period = Duration::from_secs((cache.config.dump_duration * 60).max(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(err) = cache.dump().await {
                    warn!("dump failed: {err}");
                }
            }
        })
    }

    /// Parks the caller while a dump is being encoded, re-checking the
    /// flag every `cas_sleep_time` microseconds.
    async fn wait_for_dumping(&self) {
        while self.dumping.load(Ordering::Acquire) != 0 {
            tokio::time::sleep(Duration::from_micros(self.config.cas_sleep_time)).await;
        }
    }

    fn segment_of(&self, key: &str) -> &Segment {
        &self.segments[(index_of(key) & self.mask) as usize]
    }

    pub(crate) fn segments(&self) -> &[Arc<Segment>] {
        &self.segments
    }
}

/// The segment hash: `h = 31*h + b` over the key bytes, high bits folded
/// down with `h ^ (h >> 16)`. Must stay stable across versions; restored
/// snapshots rely on keys landing in the same segment they came from.
pub(crate) fn index_of(key: &str) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key.as_bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    hash ^ (hash >> 16)
}
