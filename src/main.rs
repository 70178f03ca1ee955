use std::sync::Arc;

use meshcache::cache::Cache;
use meshcache::cluster::{ClusterRouter, MembershipService};
use meshcache::config::Config;
use meshcache::server::{HttpServer, Server, TcpServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut config = Config::from_env();
    let mut server_kind = "tcp".to_string();

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--help" || flag == "-h" {
            usage(&args[0]);
            return Ok(());
        }

        let Some(value) = args.get(i + 1) else {
            anyhow::bail!("flag {flag} needs a value (see --help)");
        };

        match flag {
            "--address" => config.address = value.clone(),
            "--port" => config.port = value.parse()?,
            "--cluster" => {
                config.cluster = value
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "--server" => server_kind = value.clone(),
            "--maxEntrySize" => config.max_entry_size = value.parse()?,
            "--maxGcCount" => config.max_gc_count = value.parse()?,
            "--gcDuration" => config.gc_duration = value.parse()?,
            "--dumpFile" => config.dump_file = value.clone(),
            "--dumpDuration" => config.dump_duration = value.parse()?,
            "--segmentCount" => config.segment_count = value.parse()?,
            "--mapSizeOfSegment" => config.map_size_of_segment = value.parse()?,
            "--casSleepTime" => config.cas_sleep_time = value.parse()?,
            "--replicaFactor" => config.replica_factor = value.parse()?,
            "--updateCircleDuration" => config.update_circle_duration = value.parse()?,
            other => anyhow::bail!("unknown flag {other} (see --help)"),
        }
        i += 2;
    }

    let address = config.server_addr();
    tracing::info!("starting cache node on {address}");
    if config.cluster.is_empty() {
        tracing::info!("no seeds configured, running as a single-node cluster");
    } else {
        tracing::info!("joining cluster via seeds {:?}", config.cluster);
    }

    // 1. The store, recovered from the last snapshot when one exists:
    let cache = Arc::new(Cache::recover(config.clone())?);
    tracing::info!(
        "cache ready with {} entries",
        cache.status().await.count
    );

    // 2. Cluster membership and routing:
    let membership = MembershipService::new(&config).await?;
    membership.start();
    let router = ClusterRouter::new(Arc::clone(&membership), &config);

    // 3. Background maintenance:
    let _gc_task = cache.spawn_gc_task();
    let _dump_task = cache.spawn_dump_task();
    let _ring_task = router.spawn_refresh_task(config.update_circle_duration);

    // 4. Serve:
    match server_kind.as_str() {
        "tcp" => TcpServer::new(cache, router, address).run().await?,
        "http" => HttpServer::new(cache, address).run().await?,
        other => anyhow::bail!("unknown server kind {other}, expected tcp or http"),
    }

    Ok(())
}

fn usage(binary: &str) {
    eprintln!("Usage: {binary} [flags]");
    eprintln!("  --address <host>             bind host (default 127.0.0.1)");
    eprintln!("  --port <port>                bind port (default 5837)");
    eprintln!("  --cluster <a:p,b:p>          seed addresses; empty = single node");
    eprintln!("  --server <tcp|http>          serving variant (default tcp)");
    eprintln!("  --maxEntrySize <mib>         cache-wide footprint cap");
    eprintln!("  --maxGcCount <n>             removals per gc pass per segment");
    eprintln!("  --gcDuration <minutes>       interval between gc passes");
    eprintln!("  --dumpFile <path>            snapshot file");
    eprintln!("  --dumpDuration <minutes>     interval between snapshots");
    eprintln!("  --segmentCount <n>           segment count, power of two");
    eprintln!("  --mapSizeOfSegment <n>       initial per-segment capacity");
    eprintln!("  --casSleepTime <micros>      dump-wait sleep per iteration");
    eprintln!("  --replicaFactor <n>          ring virtual-node multiplier");
    eprintln!("  --updateCircleDuration <s>   interval between ring rebuilds");
}
