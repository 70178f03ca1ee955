//! Snapshots: one bincode file holding every entry, the config and the
//! aggregate accounting.
//!
//! The primary file is only ever replaced by a fully written image: the
//! encoder streams into a timestamp-suffixed sibling first and renames it
//! over the primary at the end. A crash mid-encode leaves an orphan
//! suffixed file that recovery ignores.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::cache::entry::Entry;
use crate::cache::status::Status;
use crate::cache::store::{index_of, Cache};
use crate::config::Config;
use crate::error::Result;

/// An entry flattened for serialization; the live `Entry` keeps its
/// timestamp in an atomic, which has no serde form.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpEntry {
    pub data: Vec<u8>,
    pub ttl: i64,
    pub ctime: i64,
}

/// The on-disk image: all entries keyed flat (segments are rebuilt from
/// the stable key hash on recovery), the config the cache ran with, and
/// the accounting at encode time.
#[derive(Debug, Serialize, Deserialize)]
pub struct DumpImage {
    pub entries: HashMap<String, DumpEntry>,
    pub config: Config,
    pub status: Status,
}

impl DumpImage {
    /// Copies the cache state out. The caller has already raised the
    /// dumping flag; each segment's read side is additionally taken while
    /// it is visited, so a mutator that slipped past the flag check still
    /// cannot race the encoder within a segment.
    pub(crate) fn snapshot(cache: &Cache) -> DumpImage {
        let mut entries = HashMap::new();
        let mut status = Status::new();

        for segment in cache.segments() {
            segment.for_each_entry(|key, entry| {
                entries.insert(
                    key.to_string(),
                    DumpEntry {
                        data: entry.data().to_vec(),
                        ttl: entry.ttl(),
                        ctime: entry.ctime(),
                    },
                );
            });
            status.merge(&segment.status());
        }

        DumpImage {
            entries,
            config: cache.config().clone(),
            status,
        }
    }

    /// Writes the image to `dump_file` with atomic replacement:
    /// encode into `<dump_file>.YYYYMMDDhhmmss`, unlink the old primary,
    /// rename the suffixed file into place. An encode error unlinks the
    /// suffixed file and leaves the primary as it was.
    pub fn persist(&self, dump_file: &str) -> Result<()> {
        let suffixed = format!("{}.{}", dump_file, Local::now().format("%Y%m%d%H%M%S"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&suffixed)?;

        let mut writer = BufWriter::new(file);
        if let Err(err) = bincode::serialize_into(&mut writer, self) {
            drop(writer);
            let _ = fs::remove_file(&suffixed);
            return Err(err.into());
        }
        if let Err(err) = writer.flush() {
            drop(writer);
            let _ = fs::remove_file(&suffixed);
            return Err(err.into());
        }
        drop(writer);

        if fs::metadata(dump_file).is_ok() {
            let _ = fs::remove_file(dump_file);
        }
        fs::rename(&suffixed, dump_file)?;
        Ok(())
    }

    /// Reads and decodes the primary dump file.
    pub fn load(dump_file: &str) -> Result<DumpImage> {
        let file = File::open(dump_file)?;
        let image = bincode::deserialize_from(BufReader::new(file))?;
        Ok(image)
    }

    /// Rebuilds a live cache from the image, using the dumped config so
    /// the segment layout (and therefore the key-to-segment map) matches
    /// the snapshot. Per-segment accounting is recomputed on insert.
    pub fn into_cache(self) -> Result<Cache> {
        let cache = Cache::new(self.config)?;
        let segments = cache.segments();
        let mask = segments.len() as u32 - 1;

        for (key, dumped) in self.entries {
            let segment = &segments[(index_of(&key) & mask) as usize];
            segment.restore(key, Entry::restore(dumped.data, dumped.ttl, dumped.ctime));
        }
        Ok(cache)
    }
}
