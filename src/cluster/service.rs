use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::debug;

use super::types::{GossipMessage, Node, NodeState};
use crate::config::Config;
use crate::error::Result;

const GOSSIP_INTERVAL: Duration = Duration::from_millis(500);
const FAILURE_DETECTION_INTERVAL: Duration = Duration::from_secs(2);
const SUSPECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEAD_TIMEOUT: Duration = Duration::from_secs(10);

// Membership chatter stays at debug level so a cache node's log is not
// drowned in gossip traffic.
pub struct MembershipService {
    pub local_node: Node,
    pub members: Arc<DashMap<String, Node>>,
    socket: Arc<UdpSocket>,
    incarnation: Arc<RwLock<u64>>,
}

impl MembershipService {
    /// Binds the gossip socket on the node's service port (UDP) and joins
    /// the cluster through the configured seeds. An empty seed list means
    /// a single-node cluster seeded with the node's own address.
    pub async fn new(config: &Config) -> Result<Arc<Self>> {
        let address = config.server_addr();
        let socket = UdpSocket::bind(&address).await?;

        let incarnation_counter = Arc::new(RwLock::new(1u64));
        let current_inc = *incarnation_counter.read().await;
        let local_node = Node {
            address: address.clone(),
            state: NodeState::Alive,
            incarnation: current_inc,
            last_seen: Some(Instant::now()),
        };

        let members = Arc::new(DashMap::new());
        members.insert(local_node.address.clone(), local_node.clone());

        let seeds = if config.cluster.is_empty() {
            vec![address.clone()]
        } else {
            config.cluster.clone()
        };

        for seed in seeds.iter().filter(|seed| **seed != address) {
            let msg = GossipMessage::Join {
                node: local_node.clone(),
            };
            let encoded = bincode::serialize(&msg)?;
            socket.send_to(&encoded, seed).await?;
            debug!("sent join request to {seed}");
        }

        Ok(Arc::new(Self {
            local_node,
            members,
            socket: Arc::new(socket),
            incarnation: incarnation_counter,
        }))
    }

    /// Spawns the gossip, receive and failure-detection loops.
    pub fn start(self: &Arc<Self>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.gossip_loop().await;
        });

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.receive_loop().await;
        });

        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.failure_detection_loop().await;
        });
    }

    /// Addresses of all currently alive members, sorted for stable output.
    pub fn alive_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .members
            .iter()
            .filter(|entry| entry.value().state == NodeState::Alive)
            .map(|entry| entry.key().clone())
            .collect();
        addresses.sort();
        addresses
    }

    pub fn get_member(&self, address: &str) -> Option<Node> {
        self.members.get(address).map(|entry| entry.value().clone())
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(GOSSIP_INTERVAL);

        loop {
            interval.tick().await;

            let alive_members: Vec<Node> = self
                .members
                .iter()
                .filter(|entry| {
                    entry.value().address != self.local_node.address
                        && entry.value().state == NodeState::Alive
                })
                .map(|entry| entry.value().clone())
                .collect();

            if alive_members.is_empty() {
                continue;
            }

            use rand::Rng;
            let idx = rand::thread_rng().gen_range(0..alive_members.len());
            let target = &alive_members[idx];

            let incarnation = *self.incarnation.read().await;
            let msg = GossipMessage::Ping {
                from: self.local_node.address.clone(),
                incarnation,
            };

            if let Ok(encoded) = bincode::serialize(&msg) {
                if let Err(err) = self.socket.send_to(&encoded, &target.address).await {
                    debug!("failed to ping {}: {err}", target.address);
                }
            }
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match bincode::deserialize::<GossipMessage>(&buf[..len]) {
                    Ok(msg) => {
                        if let Err(err) = self.handle_message(msg).await {
                            debug!("error handling gossip from {src}: {err}");
                        }
                    }
                    Err(err) => {
                        debug!("undecodable gossip datagram from {src}: {err}");
                    }
                },
                Err(err) => {
                    debug!("gossip receive failed: {err}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_message(&self, msg: GossipMessage) -> Result<()> {
        match msg {
            GossipMessage::Ping { from, incarnation } => {
                self.handle_ping(from, incarnation).await?;
            }
            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                self.handle_ack(from, incarnation, members);
            }
            GossipMessage::Join { node } => {
                self.handle_join(node);
            }
            GossipMessage::Suspect {
                address,
                incarnation,
            } => {
                self.handle_suspect(address, incarnation).await;
            }
            GossipMessage::Alive {
                address,
                incarnation,
            } => {
                self.handle_alive(address, incarnation);
            }
        }

        Ok(())
    }

    async fn handle_ping(&self, from: String, from_incarnation: u64) -> Result<()> {
        if let Some(mut member) = self.members.get_mut(&from) {
            member.last_seen = Some(Instant::now());
            if from_incarnation > member.incarnation {
                member.incarnation = from_incarnation;
            }
        } else {
            debug!("discovered new member via ping: {from}");
            self.members.insert(
                from.clone(),
                Node {
                    address: from.clone(),
                    state: NodeState::Alive,
                    incarnation: from_incarnation,
                    last_seen: Some(Instant::now()),
                },
            );
        }

        let all_members: Vec<Node> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let my_incarnation = *self.incarnation.read().await;
        let reply = GossipMessage::Ack {
            from: self.local_node.address.clone(),
            incarnation: my_incarnation,
            members: all_members,
        };

        let encoded = bincode::serialize(&reply)?;
        self.socket.send_to(&encoded, &from).await?;
        Ok(())
    }

    fn handle_ack(&self, from: String, from_incarnation: u64, members: Vec<Node>) {
        if let Some(mut member) = self.members.get_mut(&from) {
            if from_incarnation > member.incarnation {
                member.incarnation = from_incarnation;
            }
            member.last_seen = Some(Instant::now());
        }

        for member in members {
            self.merge_member(member);
        }
    }

    fn merge_member(&self, new_member: Node) {
        if new_member.address == self.local_node.address {
            return;
        }

        match self.members.get_mut(&new_member.address) {
            Some(mut existing) => {
                if new_member.incarnation > existing.incarnation {
                    existing.state = new_member.state;
                    existing.incarnation = new_member.incarnation;
                    existing.last_seen = Some(Instant::now());
                } else if new_member.incarnation == existing.incarnation
                    && new_member.state == NodeState::Alive
                    && existing.state == NodeState::Suspect
                {
                    debug!("{} refuted suspicion", new_member.address);
                    existing.state = NodeState::Alive;
                    existing.last_seen = Some(Instant::now());
                }
            }
            None => {
                debug!("discovered new member: {}", new_member.address);
                let mut member = new_member;
                member.last_seen = Some(Instant::now());
                self.members.insert(member.address.clone(), member);
            }
        }
    }

    async fn handle_suspect(&self, address: String, incarnation: u64) {
        // Map guards are never held across an await below.
        let known = self
            .members
            .get(&address)
            .map(|member| member.incarnation);
        let Some(current) = known else {
            return;
        };
        if incarnation <= current {
            return;
        }

        if address == self.local_node.address {
            // Someone thinks we are gone; bump our incarnation and refute.
            let my_incarnation = {
                let mut inc = self.incarnation.write().await;
                *inc += 1;
                *inc
            };

            if let Some(mut existing) = self.members.get_mut(&address) {
                existing.incarnation = my_incarnation;
                existing.state = NodeState::Alive;
                existing.last_seen = Some(Instant::now());
            }

            self.broadcast(GossipMessage::Alive {
                address,
                incarnation: my_incarnation,
            })
            .await;
        } else if let Some(mut existing) = self.members.get_mut(&address) {
            debug!("node {address} suspected");
            existing.state = NodeState::Suspect;
            existing.incarnation = incarnation;
            existing.last_seen = Some(Instant::now());
        }
    }

    fn handle_alive(&self, address: String, incarnation: u64) {
        let Some(mut existing) = self.members.get_mut(&address) else {
            return;
        };

        if incarnation > existing.incarnation {
            existing.state = NodeState::Alive;
            existing.incarnation = incarnation;
            existing.last_seen = Some(Instant::now());
        } else if incarnation == existing.incarnation && existing.state == NodeState::Suspect {
            debug!("node {address} refuted suspicion");
            existing.state = NodeState::Alive;
            existing.last_seen = Some(Instant::now());
        }
    }

    fn handle_join(&self, mut node: Node) {
        debug!("node {} joining cluster", node.address);
        node.last_seen = Some(Instant::now());
        self.members.insert(node.address.clone(), node);
    }

    async fn failure_detection_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(FAILURE_DETECTION_INTERVAL);

        loop {
            interval.tick().await;
            let now = Instant::now();

            let mut to_broadcast = Vec::new();

            for mut entry in self.members.iter_mut() {
                let member = entry.value_mut();
                if member.address == self.local_node.address {
                    continue;
                }

                let Some(last_seen) = member.last_seen else {
                    member.last_seen = Some(now);
                    continue;
                };
                let elapsed = now.duration_since(last_seen);

                match member.state {
                    NodeState::Alive => {
                        if elapsed > SUSPECT_TIMEOUT {
                            debug!("node {} suspected, silent for {elapsed:?}", member.address);
                            member.state = NodeState::Suspect;
                            to_broadcast.push(GossipMessage::Suspect {
                                address: member.address.clone(),
                                incarnation: member.incarnation,
                            });
                        }
                    }
                    NodeState::Suspect => {
                        if elapsed > DEAD_TIMEOUT {
                            debug!("node {} declared dead", member.address);
                            member.state = NodeState::Dead;
                        }
                    }
                    NodeState::Dead => {}
                }
            }

            for msg in to_broadcast {
                self.broadcast(msg).await;
            }
        }
    }

    async fn broadcast(&self, msg: GossipMessage) {
        let Ok(encoded) = bincode::serialize(&msg) else {
            return;
        };

        let targets: Vec<String> = self
            .members
            .iter()
            .filter(|entry| {
                entry.value().address != self.local_node.address
                    && entry.value().state == NodeState::Alive
            })
            .map(|entry| entry.key().clone())
            .collect();

        for target in targets {
            if let Err(err) = self.socket.send_to(&encoded, &target).await {
                debug!("failed to broadcast to {target}: {err}");
            }
        }
    }
}
