//! Traits for RTSP transport abstraction.

use crate::RtspResponse;
use async_trait::async_trait;
use raop_core::error::Result;
use std::net::SocketAddr;

/// A connected control channel: writes one serialized request and reads
/// back exactly one response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RtspTransport: Send + Sync {
    /// Send a serialized request and receive its response.
    async fn send(&mut self, request: Vec<u8>) -> Result<RtspResponse>;

    /// Local end of the control connection.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Receiver end of the control connection.
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Close the connection.
    async fn close(&mut self) -> Result<()>;
}
