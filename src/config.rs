//! Configuration Module
//!
//! All tunables of the cache node in one place. Every field can be set from
//! the command line (see `main.rs`) or from environment variables, with
//! defaults that work for a single local node.

use serde::{Deserialize, Serialize};

/// Runtime configuration shared by the store, the snapshot engine, the
/// cluster coordinator and the servers.
///
/// The struct rides inside the dump image so a snapshot can be restored
/// with the exact segment layout it was written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cache-wide live footprint cap in MiB. The effective per-segment
    /// budget is `max_entry_size * 1024 * 1024 / segment_count` bytes.
    pub max_entry_size: u64,

    /// Upper bound on removals per GC pass per segment.
    pub max_gc_count: usize,

    /// Minutes between automatic GC passes.
    pub gc_duration: u64,

    /// Path of the snapshot file.
    pub dump_file: String,

    /// Minutes between automatic dumps.
    pub dump_duration: u64,

    /// Number of segments; must be a power of two.
    pub segment_count: usize,

    /// Initial capacity hint for each segment's map.
    pub map_size_of_segment: usize,

    /// Microseconds slept per dump-wait iteration.
    pub cas_sleep_time: u64,

    /// Bind host.
    pub address: String,

    /// Bind port. The framed TCP service and the UDP gossip socket share
    /// this port number.
    pub port: u16,

    /// Seed addresses (`host:port`) used to join the cluster. Empty means
    /// a single-node cluster seeded with the node's own address.
    pub cluster: Vec<String>,

    /// Virtual-node multiplier for the consistent-hash ring.
    pub replica_factor: usize,

    /// Seconds between ring rebuilds from the live membership.
    pub update_circle_duration: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entry_size: 4,
            max_gc_count: 1000,
            gc_duration: 60,
            dump_file: "meshcache.dump".to_string(),
            dump_duration: 30,
            segment_count: 256,
            map_size_of_segment: 256,
            cas_sleep_time: 1000,
            address: "127.0.0.1".to_string(),
            port: 5837,
            cluster: Vec::new(),
            replica_factor: 256,
            update_circle_duration: 3,
        }
    }
}

impl Config {
    /// Loads a config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entry_size: env_or("MAX_ENTRY_SIZE", defaults.max_entry_size),
            max_gc_count: env_or("MAX_GC_COUNT", defaults.max_gc_count),
            gc_duration: env_or("GC_DURATION", defaults.gc_duration),
            dump_file: std::env::var("DUMP_FILE").unwrap_or(defaults.dump_file),
            dump_duration: env_or("DUMP_DURATION", defaults.dump_duration),
            segment_count: env_or("SEGMENT_COUNT", defaults.segment_count),
            map_size_of_segment: env_or("MAP_SIZE_OF_SEGMENT", defaults.map_size_of_segment),
            cas_sleep_time: env_or("CAS_SLEEP_TIME", defaults.cas_sleep_time),
            address: std::env::var("ADDRESS").unwrap_or(defaults.address),
            port: env_or("PORT", defaults.port),
            cluster: std::env::var("CLUSTER")
                .map(|raw| {
                    raw.split(',')
                        .filter(|part| !part.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.cluster),
            replica_factor: env_or("REPLICA_FACTOR", defaults.replica_factor),
            update_circle_duration: env_or(
                "UPDATE_CIRCLE_DURATION",
                defaults.update_circle_duration,
            ),
        }
    }

    /// The node's service address, `host:port`. This string is also the
    /// node's identity in the cluster and on the ring.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Per-segment admission budget in bytes.
    pub fn segment_budget(&self) -> u64 {
        self.max_entry_size * 1024 * 1024 / self.segment_count as u64
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
