//! End-to-end tests over real sockets on loopback: one- and two-node
//! clusters, raw redirect errors, and the smart client following them.

use std::sync::Arc;
use std::time::Duration;

use meshcache::cache::Cache;
use meshcache::client::{CacheClient, Connection};
use meshcache::cluster::{ClusterRouter, MembershipService};
use meshcache::config::Config;
use meshcache::error::Error;
use meshcache::protocol::GET_COMMAND;
use meshcache::server::{Server, TcpServer};

struct TestNode {
    address: String,
    router: Arc<ClusterRouter>,
    cache: Arc<Cache>,
}

async fn start_node(dir: &tempfile::TempDir, port: u16, seeds: Vec<String>) -> TestNode {
    let config = Config {
        address: "127.0.0.1".to_string(),
        port,
        cluster: seeds,
        segment_count: 16,
        replica_factor: 64,
        update_circle_duration: 1,
        dump_file: dir
            .path()
            .join(format!("node-{port}.dump"))
            .to_string_lossy()
            .into_owned(),
        ..Config::default()
    };

    let cache = Arc::new(Cache::new(config.clone()).unwrap());
    let membership = MembershipService::new(&config).await.unwrap();
    membership.start();
    let router = ClusterRouter::new(membership, &config);
    let _ = router.spawn_refresh_task(config.update_circle_duration);

    let address = config.server_addr();
    let server = TcpServer::new(Arc::clone(&cache), Arc::clone(&router), address.clone());
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(100)).await;

    TestNode {
        address,
        router,
        cache,
    }
}

/// Waits until every node sees the full membership, then forces a ring
/// rebuild so routing reflects it immediately.
async fn await_convergence(nodes: &[&TestNode]) {
    for _ in 0..100 {
        if nodes
            .iter()
            .all(|node| node.router.nodes().len() == nodes.len())
        {
            for node in nodes {
                node.router.rebuild();
            }
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("cluster did not converge");
}

#[tokio::test]
async fn test_single_node_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(&dir, 16001, vec![]).await;

    let client = CacheClient::connect(&node.address, 64).await.unwrap();

    client.set("a", b"1", 0).await.unwrap();
    assert_eq!(client.get("a").await.unwrap(), b"1".to_vec());

    let status = client.status().await.unwrap();
    assert_eq!(status.count, 1);

    client.delete("a").await.unwrap();
    match client.get("a").await {
        Err(Error::NotFound) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }

    let members = client.nodes().await.unwrap();
    assert_eq!(members, vec![node.address.clone()]);
}

#[tokio::test]
async fn test_ttl_expires_over_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let node = start_node(&dir, 16002, vec![]).await;

    let client = CacheClient::connect(&node.address, 64).await.unwrap();

    client.set("b", b"2", 1).await.unwrap();
    assert_eq!(client.get("b").await.unwrap(), b"2".to_vec());

    tokio::time::sleep(Duration::from_millis(2000)).await;
    match client.get("b").await {
        Err(Error::NotFound) => {}
        other => panic!("expected NotFound after expiry, got {other:?}"),
    }
}

#[tokio::test]
async fn test_raw_client_sees_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let node_a = start_node(&dir, 16003, vec![]).await;
    let node_b = start_node(&dir, 16004, vec![node_a.address.clone()]).await;
    await_convergence(&[&node_a, &node_b]).await;

    // A key that node A does not own.
    let foreign_key = (0..)
        .map(|i| format!("key-{i}"))
        .find(|key| node_a.router.owner_of(key) == node_b.address)
        .unwrap();

    let mut raw = Connection::connect(&node_a.address).await.unwrap();
    match raw.request(GET_COMMAND, &[foreign_key.as_bytes()]).await {
        Err(Error::Redirect(owner)) => assert_eq!(owner, node_b.address),
        other => panic!("expected redirect to {}, got {other:?}", node_b.address),
    }
}

#[tokio::test]
async fn test_smart_client_follows_redirects() {
    let dir = tempfile::tempdir().unwrap();
    let node_a = start_node(&dir, 16005, vec![]).await;
    let node_b = start_node(&dir, 16006, vec![node_a.address.clone()]).await;
    await_convergence(&[&node_a, &node_b]).await;

    // A mirror with the servers' replica factor agrees with them, so
    // writes land on their owners directly.
    let client = CacheClient::connect(&node_a.address, 64).await.unwrap();
    for i in 0..20 {
        client
            .set(&format!("key-{i}"), format!("value-{i}").as_bytes(), 0)
            .await
            .unwrap();
    }
    for i in 0..20 {
        assert_eq!(
            client.get(&format!("key-{i}")).await.unwrap(),
            format!("value-{i}").into_bytes()
        );
    }

    // A client with a mismatched mirror picks wrong owners; the servers'
    // redirects must still lead every call to the right node.
    let lost_client = CacheClient::connect(&node_a.address, 7).await.unwrap();
    for i in 0..20 {
        assert_eq!(
            lost_client.get(&format!("key-{i}")).await.unwrap(),
            format!("value-{i}").into_bytes()
        );
    }

    // Both nodes should hold part of the data.
    let status_a = node_a.cache.status().await;
    let status_b = node_b.cache.status().await;
    assert_eq!(status_a.count + status_b.count, 20);
    assert!(status_a.count > 0, "node A owns none of the keys");
    assert!(status_b.count > 0, "node B owns none of the keys");
}

#[tokio::test]
async fn test_cluster_wide_nodes_listing() {
    let dir = tempfile::tempdir().unwrap();
    let node_a = start_node(&dir, 16007, vec![]).await;
    let node_b = start_node(&dir, 16008, vec![node_a.address.clone()]).await;
    await_convergence(&[&node_a, &node_b]).await;

    let client = CacheClient::connect(&node_b.address, 64).await.unwrap();
    let mut members = client.nodes().await.unwrap();
    members.sort();

    let mut expected = vec![node_a.address.clone(), node_b.address.clone()];
    expected.sort();
    assert_eq!(members, expected);
}
