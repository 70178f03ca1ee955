//! Cluster Coordination Module
//!
//! Keeps every node's view of the cluster converged and maps keys to their
//! owning node.
//!
//! ## Core Mechanisms
//! - **Gossip Membership**: nodes exchange status over UDP (SWIM-style
//!   ping/ack with suspect/refute) so joins and failures propagate without
//!   a central registry. A node's identity is its service address.
//! - **Consistent-Hash Ring**: each live member occupies `replica_factor`
//!   virtual positions; a key belongs to the first position at or after
//!   its hash. Identical membership yields identical lookups on every
//!   node, which is what makes server- and client-side routing agree.
//! - **Routing**: the ring is rebuilt wholesale from the live membership,
//!   periodically and on demand; requests for keys owned elsewhere are
//!   answered with a redirect naming the owner.

pub mod ring;
pub mod router;
pub mod service;
pub mod types;

pub use ring::HashRing;
pub use router::ClusterRouter;
pub use service::MembershipService;
pub use types::{GossipMessage, Node, NodeState};

#[cfg(test)]
mod tests;
