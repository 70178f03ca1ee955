//! Client Module Tests
//!
//! Pool expiry behavior and the client/server ownership agreement; the
//! redirect-following path is exercised end to end in the integration
//! tests where two live servers run.

#[cfg(test)]
mod tests {
    use crate::client::pool::{ConnectionPool, CONNECTION_TTL};
    use crate::error::Error;

    #[tokio::test]
    async fn test_pool_connect_failure_surfaces_io_error() {
        let pool = ConnectionPool::new();

        // Nothing listens there.
        match pool.get("127.0.0.1:1").await {
            Err(Error::Io(_)) => {}
            other => panic!("expected io error, got {other:?}"),
        }
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_pool_reuses_cached_connection() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new();
        let first = pool.get(&address).await.unwrap();
        let second = pool.get(&address).await.unwrap();

        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_pool_remove_forces_redial() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new();
        let first = pool.get(&address).await.unwrap();
        pool.remove(&address);
        let second = pool.get(&address).await.unwrap();

        assert!(!std::sync::Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_pool_sweep_only_drops_expired() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let pool = ConnectionPool::new();
        pool.get(&address).await.unwrap();

        assert_eq!(pool.sweep(), 0, "fresh entries survive a sweep");
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_ttl_constants() {
        // The pool contract: entries live 15 minutes, swept every 10.
        assert_eq!(CONNECTION_TTL.as_secs(), 15 * 60);
        assert_eq!(crate::client::pool::SWEEP_INTERVAL.as_secs(), 10 * 60);
    }
}
