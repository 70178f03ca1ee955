//! A TTL-cached pool of per-node connections.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use super::conn::Connection;
use crate::error::Result;

/// How long a pooled connection may be reused before it is re-dialed.
pub const CONNECTION_TTL: Duration = Duration::from_secs(15 * 60);

/// How often the sweep task drops expired pool entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

struct PooledConnection {
    conn: Arc<Mutex<Connection>>,
    cached_at: Instant,
}

/// Connections keyed by node address. An entry is immutable once cached;
/// expiry and explicit removal are the only ways out.
pub struct ConnectionPool {
    conns: DashMap<String, PooledConnection>,
}

impl ConnectionPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            conns: DashMap::new(),
        })
    }

    /// A live connection to `address`: the pooled one if fresh, otherwise
    /// a new dial that replaces whatever was cached.
    pub async fn get(&self, address: &str) -> Result<Arc<Mutex<Connection>>> {
        if let Some(entry) = self.conns.get(address) {
            if entry.cached_at.elapsed() < CONNECTION_TTL {
                return Ok(Arc::clone(&entry.conn));
            }
        }

        let conn = Arc::new(Mutex::new(Connection::connect(address).await?));
        self.conns.insert(
            address.to_string(),
            PooledConnection {
                conn: Arc::clone(&conn),
                cached_at: Instant::now(),
            },
        );
        Ok(conn)
    }

    /// Drops the cached connection for `address`, typically after a
    /// transport error.
    pub fn remove(&self, address: &str) {
        self.conns.remove(address);
    }

    /// Drops every entry past its TTL. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.conns.len();
        self.conns
            .retain(|_, entry| entry.cached_at.elapsed() < CONNECTION_TTL);
        before - self.conns.len()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Spawns the periodic sweep. Aborting the handle stops it.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            interval.tick().await;
            loop {
                interval.tick().await;
                let dropped = pool.sweep();
                if dropped > 0 {
                    debug!("connection pool dropped {dropped} expired entries");
                }
            }
        })
    }
}
