//! Local UDP port allocation.

use std::net::{IpAddr, SocketAddr};

use raop_core::error::{Error, Result};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

/// Binds UDP sockets by scanning upward from a preferred port.
#[derive(Debug, Clone, Copy)]
pub struct UdpPortAllocator {
    bind_ip: IpAddr,
    attempts: u32,
}

impl UdpPortAllocator {
    pub fn new(bind_ip: IpAddr, attempts: u32) -> Self {
        Self { bind_ip, attempts }
    }

    /// Bind the first free port in `preferred..preferred + attempts`.
    ///
    /// The scan never goes past 65535.
    pub async fn bind(&self, preferred: u16) -> Result<(UdpSocket, u16)> {
        let last = (preferred as u32 + self.attempts.saturating_sub(1)).min(u16::MAX as u32) as u16;

        for port in preferred..=last {
            match UdpSocket::bind(SocketAddr::new(self.bind_ip, port)).await {
                Ok(socket) => {
                    let bound = socket.local_addr()?.port();
                    debug!("Bound UDP port {}", bound);
                    return Ok((socket, bound));
                }
                Err(e) => trace!("UDP port {} unavailable: {}", port, e),
            }
        }

        Err(Error::PortExhaustion {
            first_port: preferred,
            attempts: self.attempts,
        })
    }
}

/// Local ports of the three UDP sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPorts {
    pub audio: u16,
    pub control: u16,
    pub timing: u16,
}
