//! The framed binary TCP server.
//!
//! One task per connection; each request is dispatched by its command
//! byte. Key-addressed commands are routed through the ring first — a key
//! owned by another node is answered with a redirect error naming the
//! owner, and only `status` / `nodes` are always served locally.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, info};

use super::Server;
use crate::cache::Cache;
use crate::cluster::ClusterRouter;
use crate::error::{Error, Result};
use crate::protocol::{
    self, Request, DELETE_COMMAND, GET_COMMAND, NODES_COMMAND, SET_COMMAND, STATUS_COMMAND,
};

pub struct TcpServer {
    cache: Arc<Cache>,
    router: Arc<ClusterRouter>,
    address: String,
}

impl TcpServer {
    pub fn new(cache: Arc<Cache>, router: Arc<ClusterRouter>, address: String) -> Self {
        Self {
            cache,
            router,
            address,
        }
    }
}

impl Server for TcpServer {
    async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.address).await?;
        info!("tcp server listening on {}", self.address);

        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("connection from {peer}");

            let cache = Arc::clone(&self.cache);
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                serve_connection(cache, router, stream).await;
            });
        }
    }
}

async fn serve_connection<S>(cache: Arc<Cache>, router: Arc<ClusterRouter>, stream: S)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    loop {
        let request = match protocol::read_request(&mut reader).await {
            Ok(request) => request,
            // EOF or a broken frame both end the connection.
            Err(_) => return,
        };

        let result = dispatch(&cache, &router, request).await;
        if protocol::write_response(&mut writer, &result).await.is_err() {
            return;
        }
    }
}

pub(crate) async fn dispatch(
    cache: &Cache,
    router: &ClusterRouter,
    request: Request,
) -> Result<Vec<u8>> {
    match request.command {
        GET_COMMAND => handle_get(cache, router, &request.args).await,
        SET_COMMAND => handle_set(cache, router, &request.args).await,
        DELETE_COMMAND => handle_delete(cache, router, &request.args).await,
        STATUS_COMMAND => handle_status(cache).await,
        NODES_COMMAND => handle_nodes(router),
        other => Err(Error::Server(format!("unknown command {other}"))),
    }
}

/// Fails with a redirect unless this node owns `key`.
fn check_ownership(router: &ClusterRouter, key: &str) -> Result<()> {
    let owner = router.owner_of(key);
    if router.is_local(&owner) {
        Ok(())
    } else {
        Err(Error::Redirect(owner))
    }
}

async fn handle_get(cache: &Cache, router: &ClusterRouter, args: &[Vec<u8>]) -> Result<Vec<u8>> {
    if args.is_empty() {
        return Err(Error::NeedsMoreArguments);
    }

    let key = String::from_utf8_lossy(&args[0]);
    check_ownership(router, &key)?;

    cache.get(&key).await.ok_or(Error::NotFound)
}

async fn handle_set(cache: &Cache, router: &ClusterRouter, args: &[Vec<u8>]) -> Result<Vec<u8>> {
    if args.len() < 3 || args[0].len() < 8 {
        return Err(Error::NeedsMoreArguments);
    }

    let key = String::from_utf8_lossy(&args[1]);
    check_ownership(router, &key)?;

    // Big-endian on the wire, reinterpreted as signed seconds.
    let mut ttl_bytes = [0u8; 8];
    ttl_bytes.copy_from_slice(&args[0][..8]);
    let ttl = u64::from_be_bytes(ttl_bytes) as i64;

    cache.set(&key, &args[2], ttl).await?;
    Ok(Vec::new())
}

async fn handle_delete(cache: &Cache, router: &ClusterRouter, args: &[Vec<u8>]) -> Result<Vec<u8>> {
    if args.is_empty() {
        return Err(Error::NeedsMoreArguments);
    }

    let key = String::from_utf8_lossy(&args[0]);
    check_ownership(router, &key)?;

    cache.delete(&key).await;
    Ok(Vec::new())
}

async fn handle_status(cache: &Cache) -> Result<Vec<u8>> {
    let status = cache.status().await;
    serde_json::to_vec(&status).map_err(|err| Error::Server(err.to_string()))
}

fn handle_nodes(router: &ClusterRouter) -> Result<Vec<u8>> {
    serde_json::to_vec(&router.nodes()).map_err(|err| Error::Server(err.to_string()))
}
