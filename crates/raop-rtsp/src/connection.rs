//! RTSP control connection to a RAOP receiver.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use raop_core::error::{Error, ProtocolError, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

use crate::traits::RtspTransport;
use crate::RtspResponse;

/// Largest response body accepted from a receiver.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Resolve `host:port`, failing with "no such device" when nothing resolves.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| {
            debug!("Resolution of {} failed: {}", host, e);
            Error::AddressResolution {
                host: host.to_string(),
            }
        })?;
    addrs.next().ok_or_else(|| Error::AddressResolution {
        host: host.to_string(),
    })
}

/// Open a TCP connection, bounded by `connect_timeout`.
pub async fn connect_tcp(addr: SocketAddr, connect_timeout: Duration) -> Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, format!("connect to {} timed out", addr)))??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Connected RTSP control channel.
///
/// The read half stays wrapped in one `BufReader` for the lifetime of the
/// connection so bytes buffered past one response are not lost.
pub struct RtspConnection {
    local: SocketAddr,
    peer: SocketAddr,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    response_timeout: Option<Duration>,
}

impl RtspConnection {
    /// Resolve `host` and connect to it.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let addr = resolve(host, port).await?;
        debug!("Connecting control channel to {}", addr);
        let stream = connect_tcp(addr, connect_timeout).await?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let local = stream.local_addr()?;
        let peer = stream.peer_addr()?;
        let (read, writer) = stream.into_split();
        Ok(Self {
            local,
            peer,
            reader: BufReader::new(read),
            writer,
            response_timeout: None,
        })
    }

    /// Bound the wait for each response. Unbounded by default.
    pub fn set_response_timeout(&mut self, response_timeout: Option<Duration>) {
        self.response_timeout = response_timeout;
    }

    async fn read_response(&mut self) -> Result<RtspResponse> {
        match self.response_timeout {
            Some(limit) => timeout(limit, read_response(&mut self.reader))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "RTSP response timed out"))?,
            None => read_response(&mut self.reader).await,
        }
    }
}

/// Read status line and headers up to the blank line, then the body.
async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<RtspResponse> {
    let mut head = Vec::new();
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "control connection closed mid-response",
            )
            .into());
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
        head.extend_from_slice(line.as_bytes());
    }

    let mut response = RtspResponse::parse_head(&head)?;
    if let Some(len) = response.content_length().filter(|&len| len > 0) {
        if len > MAX_BODY_BYTES {
            return Err(ProtocolError::InvalidResponse(format!(
                "body too large ({} bytes)",
                len
            ))
            .into());
        }
        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        response.body = Some(body);
    }
    Ok(response)
}

#[async_trait]
impl RtspTransport for RtspConnection {
    async fn send(&mut self, request: Vec<u8>) -> Result<RtspResponse> {
        self.writer.write_all(&request).await?;
        self.writer.flush().await?;

        let response = self.read_response().await?;
        debug!(
            "RTSP <- {} {} (cseq={:?})",
            response.status_code,
            response.status_text,
            response.cseq()
        );
        Ok(response)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
