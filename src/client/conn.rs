//! One framed connection to one node.

use tokio::net::TcpStream;

use crate::error::Result;
use crate::protocol;

/// A TCP connection speaking the framed binary protocol. Requests and
/// responses alternate strictly, so the whole stream is used exclusively
/// by one request at a time; the pool wraps connections in a mutex.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    pub async fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self { stream })
    }

    /// Sends one command and waits for its response body. An error reply
    /// from the server comes back as the typed error its text encodes.
    pub async fn request(&mut self, command: u8, args: &[&[u8]]) -> Result<Vec<u8>> {
        protocol::write_request(&mut self.stream, command, args).await?;
        protocol::read_response(&mut self.stream).await
    }
}
