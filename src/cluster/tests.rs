//! Cluster Module Tests
//!
//! Covers ring determinism (the property server/client routing agreement
//! rests on), membership bootstrap and the router's ownership answers.

#[cfg(test)]
mod tests {
    use crate::cluster::ring::HashRing;
    use crate::cluster::router::ClusterRouter;
    use crate::cluster::service::MembershipService;
    use crate::cluster::types::{GossipMessage, Node, NodeState};
    use crate::config::Config;

    fn members(addresses: &[&str]) -> Vec<String> {
        addresses.iter().map(|a| a.to_string()).collect()
    }

    // ============================================================
    // RING TESTS
    // ============================================================

    #[test]
    fn test_ring_lookup_is_deterministic() {
        let ring = HashRing::build(&members(&["10.0.0.1:5837", "10.0.0.2:5837"]), 128);

        for i in 0..100 {
            let key = format!("key-{i}");
            assert_eq!(ring.lookup(&key), ring.lookup(&key));
        }
    }

    #[test]
    fn test_identical_inputs_build_identical_rings() {
        let a = HashRing::build(
            &members(&["10.0.0.1:5837", "10.0.0.2:5837", "10.0.0.3:5837"]),
            128,
        );
        // Same members, different order.
        let b = HashRing::build(
            &members(&["10.0.0.3:5837", "10.0.0.1:5837", "10.0.0.2:5837"]),
            128,
        );

        for i in 0..1000 {
            let key = format!("key-{i}");
            assert_eq!(a.lookup(&key), b.lookup(&key), "rings disagree on {key}");
        }
    }

    #[test]
    fn test_empty_ring_has_no_owner() {
        let ring = HashRing::build(&[], 128);
        assert!(ring.is_empty());
        assert_eq!(ring.lookup("anything"), None);
    }

    #[test]
    fn test_single_member_owns_everything() {
        let ring = HashRing::build(&members(&["127.0.0.1:5837"]), 16);

        for i in 0..100 {
            assert_eq!(ring.lookup(&format!("key-{i}")), Some("127.0.0.1:5837"));
        }
    }

    #[test]
    fn test_ring_spreads_keys_over_members() {
        let addresses = members(&["10.0.0.1:5837", "10.0.0.2:5837", "10.0.0.3:5837"]);
        let ring = HashRing::build(&addresses, 256);

        let mut counts = std::collections::HashMap::new();
        for i in 0..3000 {
            let owner = ring.lookup(&format!("key-{i}")).unwrap().to_string();
            *counts.entry(owner).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 3, "every member should own some keys");
        for (owner, count) in counts {
            assert!(count > 300, "{owner} owns suspiciously few keys: {count}");
        }
    }

    #[test]
    fn test_replica_factor_is_recorded() {
        let ring = HashRing::build(&members(&["a:1"]), 64);
        assert_eq!(ring.replicas(), 64);
    }

    // ============================================================
    // GOSSIP MESSAGE TESTS
    // ============================================================

    #[test]
    fn test_gossip_message_round_trip() {
        let msg = GossipMessage::Ack {
            from: "10.0.0.1:5837".to_string(),
            incarnation: 7,
            members: vec![Node {
                address: "10.0.0.2:5837".to_string(),
                state: NodeState::Alive,
                incarnation: 3,
                last_seen: None,
            }],
        };

        let encoded = bincode::serialize(&msg).unwrap();
        let decoded: GossipMessage = bincode::deserialize(&encoded).unwrap();

        match decoded {
            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                assert_eq!(from, "10.0.0.1:5837");
                assert_eq!(incarnation, 7);
                assert_eq!(members.len(), 1);
                assert!(members[0].last_seen.is_none());
            }
            other => panic!("wrong message type: {other:?}"),
        }
    }

    #[test]
    fn test_node_last_seen_is_not_serialized() {
        let node = Node {
            address: "127.0.0.1:9000".to_string(),
            state: NodeState::Suspect,
            incarnation: 42,
            last_seen: Some(std::time::Instant::now()),
        };

        let encoded = bincode::serialize(&node).unwrap();
        let decoded: Node = bincode::deserialize(&encoded).unwrap();
        assert_eq!(decoded.address, node.address);
        assert_eq!(decoded.state, NodeState::Suspect);
        assert!(decoded.last_seen.is_none());
    }

    // ============================================================
    // MEMBERSHIP SERVICE TESTS
    // ============================================================

    fn loopback_config(port: u16) -> Config {
        Config {
            address: "127.0.0.1".to_string(),
            port,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_single_node_membership() {
        let config = loopback_config(15837);
        let service = MembershipService::new(&config).await.unwrap();

        let alive = service.alive_addresses();
        assert_eq!(alive, vec!["127.0.0.1:15837".to_string()]);
        assert_eq!(service.local_node.state, NodeState::Alive);
    }

    #[tokio::test]
    async fn test_get_member() {
        let config = loopback_config(15838);
        let service = MembershipService::new(&config).await.unwrap();

        assert!(service.get_member("127.0.0.1:15838").is_some());
        assert!(service.get_member("10.9.9.9:1").is_none());
    }

    // ============================================================
    // ROUTER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_node_router_owns_all_keys() {
        let config = loopback_config(15839);
        let membership = MembershipService::new(&config).await.unwrap();
        let router = ClusterRouter::new(membership, &config);

        for i in 0..50 {
            let owner = router.owner_of(&format!("key-{i}"));
            assert!(router.is_local(&owner));
            assert_eq!(owner, "127.0.0.1:15839");
        }
    }

    #[tokio::test]
    async fn test_router_and_standalone_ring_agree() {
        let config = loopback_config(15840);
        let membership = MembershipService::new(&config).await.unwrap();
        let router = ClusterRouter::new(membership, &config);

        // A client mirroring the membership with the same replica factor
        // must pick the same owners the server does.
        let mirror = HashRing::build(&router.nodes(), config.replica_factor);
        for i in 0..200 {
            let key = format!("key-{i}");
            assert_eq!(router.owner_of(&key), mirror.lookup(&key).unwrap());
        }
    }
}
