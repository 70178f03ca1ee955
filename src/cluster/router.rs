use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ring::HashRing;
use super::service::MembershipService;
use crate::config::Config;

/// Routing decisions for the server side: who owns a key, and is that us.
///
/// Holds the membership service and a ring rebuilt from the live members,
/// periodically and on demand. The ring is replaced wholesale under a
/// short write lock; lookups take the read side.
pub struct ClusterRouter {
    membership: Arc<MembershipService>,
    ring: RwLock<HashRing>,
    local_address: String,
    replica_factor: usize,
}

impl ClusterRouter {
    pub fn new(membership: Arc<MembershipService>, config: &Config) -> Arc<Self> {
        let router = Arc::new(Self {
            local_address: membership.local_node.address.clone(),
            ring: RwLock::new(HashRing::default()),
            membership,
            replica_factor: config.replica_factor,
        });
        router.rebuild();
        router
    }

    /// Rebuilds the ring from the currently alive members.
    pub fn rebuild(&self) {
        let members = self.membership.alive_addresses();
        let ring = HashRing::build(&members, self.replica_factor);
        *self.ring.write() = ring;
    }

    /// The address owning `key`. An empty ring (transiently possible
    /// before the first member is seen) routes to the local node.
    pub fn owner_of(&self, key: &str) -> String {
        self.ring
            .read()
            .lookup(key)
            .map(str::to_string)
            .unwrap_or_else(|| self.local_address.clone())
    }

    pub fn is_local(&self, owner: &str) -> bool {
        owner == self.local_address
    }

    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Alive member addresses, as served by the `nodes` command.
    pub fn nodes(&self) -> Vec<String> {
        self.membership.alive_addresses()
    }

    /// Spawns the periodic ring rebuild. Aborting the handle stops it.
    pub fn spawn_refresh_task(self: &Arc<Self>, period_secs: u64) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
            loop {
                interval.tick().await;
                router.rebuild();
                debug!("ring rebuilt over {} nodes", router.nodes().len());
            }
        })
    }
}
