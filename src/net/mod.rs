//! Transport seam: how framed requests reach a store node
//!
//! A [`Transport`] moves one framed request to a node and returns the
//! framed response, with a single outstanding request per connection. A
//! [`Connector`] dials a host and yields a transport. The TCP pair here
//! is the production path; [`mem`] provides an in-process pair backed by
//! a [`mem::MemServer`] speaking the same wire format.

pub mod mem;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::common::{Error, Result};
use crate::wire::frame::{self, HEADER_LEN, TRAILER_LEN};

#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send one framed request and return the framed response. The
    /// deadline covers the whole exchange; on expiry the call returns
    /// `Timeout` and no further side effect is initiated by this layer.
    async fn send(&self, request: Bytes, deadline: Duration) -> Result<Bytes>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish reachability of a host, yielding a transport to it.
    async fn connect(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>>;
}

/// TCP transport. The stream lives behind an async mutex, which is what
/// enforces the one-outstanding-request-per-connection contract.
pub struct TcpTransport {
    peer: String,
    stream: Mutex<TcpStream>,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl TcpTransport {
    async fn exchange(stream: &mut TcpStream, request: &[u8]) -> Result<Bytes> {
        stream.write_all(request).await?;
        stream.flush().await?;

        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).await?;
        let (_, body_len) = frame::parse_header(&header)?;

        let mut rest = vec![0u8; body_len + TRAILER_LEN];
        stream.read_exact(&mut rest).await?;

        let mut raw = BytesMut::with_capacity(HEADER_LEN + rest.len());
        raw.put_slice(&header);
        raw.put_slice(&rest);
        Ok(raw.freeze())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, request: Bytes, deadline: Duration) -> Result<Bytes> {
        let mut stream = self.stream.lock().await;
        match tokio::time::timeout(deadline, Self::exchange(&mut stream, &request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("request to {} timed out after {:?}", self.peer, deadline);
                Err(Error::Timeout(format!(
                    "no response from {} within {:?}",
                    self.peer, deadline
                )))
            }
        }
    }
}

/// Dials store nodes over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<Arc<dyn Transport>> {
        let peer = format!("{}:{}", address, port);
        match tokio::time::timeout(timeout, TcpStream::connect(&peer)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                tracing::debug!("connected to {}", peer);
                Ok(Arc::new(TcpTransport {
                    peer,
                    stream: Mutex::new(stream),
                }))
            }
            Ok(Err(e)) => {
                tracing::warn!("failed to connect to {}: {}", peer, e);
                Err(Error::HostUnreachable(format!("{}: {}", peer, e)))
            }
            Err(_) => {
                tracing::warn!("connect to {} timed out after {:?}", peer, timeout);
                Err(Error::HostUnreachable(format!("{}: connect timed out", peer)))
            }
        }
    }
}
