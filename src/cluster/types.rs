use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Lifecycle state of a node as seen by the local failure detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NodeState {
    /// Healthy and responsive.
    Alive,
    /// Missed the heartbeat window; may refute the suspicion or time out
    /// into `Dead`.
    Suspect,
    /// Confirmed failed; removed from the routable cluster view.
    Dead,
}

/// One member of the cluster.
///
/// A node is identified by its service address (`host:port`) — the same
/// string clients dial, servers put into redirect errors, and the ring
/// hashes into virtual positions. Gossip runs over UDP on the same port
/// number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Service address and cluster-wide identity.
    pub address: String,
    /// Current health state.
    pub state: NodeState,
    /// Logical clock versioning this node's state; higher wins.
    pub incarnation: u64,

    /// When this node was last heard from. Local-only; never serialized.
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

/// The gossip wire protocol, bincode-encoded over UDP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GossipMessage {
    /// Health check carrying the sender's incarnation.
    Ping { from: String, incarnation: u64 },

    /// Ping response; carries the responder's member list so cluster
    /// state spreads with every exchange.
    Ack {
        from: String,
        incarnation: u64,
        members: Vec<Node>,
    },

    /// Sent by a joining node to a seed address.
    Join { node: Node },

    /// Broadcast claiming a node is suspected dead.
    Suspect { address: String, incarnation: u64 },

    /// Broadcast claiming a node is alive, usually refuting a suspicion.
    Alive { address: String, incarnation: u64 },
}
