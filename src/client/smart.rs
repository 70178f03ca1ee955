//! The cluster-aware client.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use super::pool::ConnectionPool;
use crate::cache::Status;
use crate::cluster::HashRing;
use crate::error::{Error, Result};
use crate::protocol::{
    DELETE_COMMAND, GET_COMMAND, NODES_COMMAND, SET_COMMAND, STATUS_COMMAND,
};

/// How many redirects a single call may follow before giving up.
pub const MAX_REDIRECT_TIMES: usize = 5;

/// A client that mirrors the server's consistent-hash ring so most calls
/// land on the right node first try, and transparently follows the
/// server's redirect answers when the mirror is stale.
///
/// The mirror must be built with the same replica factor the servers use,
/// or client and server would disagree on ownership for every key.
pub struct CacheClient {
    ring: RwLock<HashRing>,
    nodes: RwLock<Vec<String>>,
    pool: Arc<ConnectionPool>,
    replica_factor: usize,
    sweep_task: JoinHandle<()>,
}

impl Drop for CacheClient {
    fn drop(&mut self) {
        self.sweep_task.abort();
    }
}

impl CacheClient {
    /// Connects to `seed`, learns the member list from it and builds the
    /// local ring mirror. The pool's expiry sweep runs for as long as the
    /// client lives.
    pub async fn connect(seed: &str, replica_factor: usize) -> Result<Self> {
        let pool = ConnectionPool::new();
        let sweep_task = pool.spawn_sweep_task();

        let client = Self {
            ring: RwLock::new(HashRing::default()),
            nodes: RwLock::new(vec![seed.to_string()]),
            pool,
            replica_factor,
            sweep_task,
        };
        client.refresh_nodes().await?;
        Ok(client)
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.call(Some(key), GET_COMMAND, &[key.as_bytes()]).await
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: i64) -> Result<()> {
        let ttl_bytes = (ttl as u64).to_be_bytes();
        self.call(
            Some(key),
            SET_COMMAND,
            &[&ttl_bytes, key.as_bytes(), value],
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.call(Some(key), DELETE_COMMAND, &[key.as_bytes()])
            .await?;
        Ok(())
    }

    pub async fn status(&self) -> Result<Status> {
        let body = self.call(None, STATUS_COMMAND, &[]).await?;
        serde_json::from_slice(&body).map_err(|err| Error::Server(err.to_string()))
    }

    pub async fn nodes(&self) -> Result<Vec<String>> {
        let body = self.call(None, NODES_COMMAND, &[]).await?;
        serde_json::from_slice(&body).map_err(|err| Error::Server(err.to_string()))
    }

    /// The node a call should start at: the ring's owner for keyed
    /// commands, any known node otherwise.
    fn pick_target(&self, key: Option<&str>) -> Result<String> {
        if let Some(key) = key {
            if let Some(owner) = self.ring.read().lookup(key) {
                return Ok(owner.to_string());
            }
        }
        self.nodes
            .read()
            .first()
            .cloned()
            .ok_or(Error::NoClientAvailable)
    }

    /// Issues one command, following redirects and recovering from dead
    /// connections, up to the redirect bound.
    async fn call(&self, key: Option<&str>, command: u8, args: &[&[u8]]) -> Result<Vec<u8>> {
        let mut target = self.pick_target(key)?;

        for _ in 0..=MAX_REDIRECT_TIMES {
            let outcome = match self.pool.get(&target).await {
                Ok(conn) => conn.lock().await.request(command, args).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(body) => return Ok(body),
                Err(Error::Redirect(owner)) => {
                    debug!("redirected from {target} to {owner}");
                    target = owner;
                }
                Err(Error::Io(err)) => {
                    // The node went away mid-conversation; forget its
                    // connection, re-learn the cluster and try again.
                    debug!("transport to {target} failed: {err}");
                    self.pool.remove(&target);
                    self.refresh_nodes().await?;
                    target = self.pick_target(key)?;
                }
                Err(other) => return Err(other),
            }
        }

        Err(Error::ReachedMaxRedirects)
    }

    /// Rebuilds the node list and ring mirror from the first member that
    /// still answers a `nodes` command.
    pub async fn refresh_nodes(&self) -> Result<()> {
        let known = self.nodes.read().clone();

        for address in known {
            let Ok(conn) = self.pool.get(&address).await else {
                self.pool.remove(&address);
                continue;
            };

            let body = match conn.lock().await.request(NODES_COMMAND, &[]).await {
                Ok(body) => body,
                Err(_) => {
                    self.pool.remove(&address);
                    continue;
                }
            };

            let Ok(nodes) = serde_json::from_slice::<Vec<String>>(&body) else {
                continue;
            };
            if nodes.is_empty() {
                continue;
            }

            *self.ring.write() = HashRing::build(&nodes, self.replica_factor);
            *self.nodes.write() = nodes;
            return Ok(());
        }

        Err(Error::NoClientAvailable)
    }
}
