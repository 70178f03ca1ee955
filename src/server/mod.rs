//! Server Module
//!
//! Two serving variants wrap the same cache: the framed binary TCP server
//! (the cluster-aware primary interface) and an HTTP façade for anything
//! that would rather speak REST. Both expose the same capability — bind
//! an address and serve until the process exits.

pub mod http;
pub mod tcp;

pub use http::HttpServer;
pub use tcp::TcpServer;

use crate::error::Result;

/// The one capability a serving variant provides.
pub trait Server {
    /// Binds the configured address and serves forever.
    fn run(self) -> impl std::future::Future<Output = Result<()>> + Send;
}
