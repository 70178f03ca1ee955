//! Async encode/decode of request and response frames.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{MAX_FRAME_BYTES, MAX_REQUEST_ARGS, PROTOCOL_VERSION, REPLY_ERR, REPLY_OK};
use crate::error::{Error, Result};

/// A decoded request: one command byte plus its ordered byte-string
/// arguments.
#[derive(Debug)]
pub struct Request {
    pub command: u8,
    pub args: Vec<Vec<u8>>,
}

/// Reads one request frame. An unexpected EOF before the first byte is the
/// normal way a client hangs up between requests.
pub async fn read_request<R>(reader: &mut R) -> io::Result<Request>
where
    R: AsyncRead + Unpin,
{
    let version = reader.read_u8().await?;
    if version != PROTOCOL_VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported protocol version {version}"),
        ));
    }

    let command = reader.read_u8().await?;
    let arg_count = reader.read_u32().await?;
    if arg_count > MAX_REQUEST_ARGS {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "argument count exceeds limit",
        ));
    }

    let mut args = Vec::with_capacity(arg_count as usize);
    for _ in 0..arg_count {
        args.push(read_chunk(reader).await?);
    }

    Ok(Request { command, args })
}

/// Writes one request frame.
pub async fn write_request<W>(writer: &mut W, command: u8, args: &[&[u8]]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u8(PROTOCOL_VERSION).await?;
    writer.write_u8(command).await?;
    writer.write_u32(args.len() as u32).await?;
    for arg in args {
        writer.write_u32(arg.len() as u32).await?;
        writer.write_all(arg).await?;
    }
    writer.flush().await
}

/// Writes one response frame. A success carries the body verbatim; an
/// error carries its display text.
pub async fn write_response<W>(writer: &mut W, result: &Result<Vec<u8>>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u8(PROTOCOL_VERSION).await?;
    match result {
        Ok(body) => {
            writer.write_u8(REPLY_OK).await?;
            writer.write_u32(body.len() as u32).await?;
            writer.write_all(body).await?;
        }
        Err(err) => {
            let text = err.to_string();
            writer.write_u8(REPLY_ERR).await?;
            writer.write_u32(text.len() as u32).await?;
            writer.write_all(text.as_bytes()).await?;
        }
    }
    writer.flush().await
}

/// Reads one response frame, turning an error reply back into the typed
/// error its text encodes.
pub async fn read_response<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let version = reader.read_u8().await?;
    if version != PROTOCOL_VERSION {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported protocol version {version}"),
        )));
    }

    let reply = reader.read_u8().await?;
    let body = read_chunk(reader).await?;

    match reply {
        REPLY_OK => Ok(body),
        _ => Err(Error::from_response_text(&String::from_utf8_lossy(&body))),
    }
}

async fn read_chunk<R>(reader: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame length exceeds limit",
        ));
    }

    let mut chunk = vec![0u8; len as usize];
    reader.read_exact(&mut chunk).await?;
    Ok(chunk)
}
