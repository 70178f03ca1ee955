use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Consistent-hash ring mapping keys to owner addresses.
///
/// Every member occupies `replicas` virtual positions, hashed from
/// `"<address>#<i>"`. A key belongs to the member at the first position at
/// or after the key's hash, wrapping around at the top. Two rings built
/// from the same `(members, replicas)` answer every lookup identically,
/// no matter the build order — that property is what lets a client route
/// locally and only rarely be redirected.
///
/// The ring is immutable; membership changes are absorbed by building a
/// fresh ring and swapping it in wholesale.
#[derive(Debug, Default)]
pub struct HashRing {
    positions: BTreeMap<u64, String>,
    replicas: usize,
}

impl HashRing {
    /// Builds a ring over `members` with `replicas` virtual positions per
    /// member.
    pub fn build(members: &[String], replicas: usize) -> Self {
        let mut positions = BTreeMap::new();
        for member in members {
            for i in 0..replicas {
                positions.insert(position_hash(member, i), member.clone());
            }
        }
        Self { positions, replicas }
    }

    /// The owner of `key`, or `None` on an empty ring.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = key_hash(key);
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, address)| address.as_str())
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn key_hash(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

fn position_hash(address: &str, replica: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    format!("{address}#{replica}").hash(&mut hasher);
    hasher.finish()
}
