//! Timing responder for the UDP transport.
//!
//! The receiver periodically sends timing requests (payload type 0x52) to
//! the sender's timing port; each is answered with the current wall clock.
//! Once the socket is connected to the receiver's timing port, replies go
//! to that port and requests from anywhere else never arrive.
//! The responder is single-shot: the first receive error ends it for good.

use std::sync::Arc;

use raop_core::RtpSnapshot;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::clock::WallClock;

/// Payload type of a timing request.
pub const TIMING_REQUEST: u8 = 0x52;

/// Payload type of a timing response.
pub const TIMING_RESPONSE: u8 = 0x53;

const MARKER: u8 = 0x80;
const MIN_PACKET_LEN: usize = 8;

/// Build the 32-byte reply to a timing request.
///
/// Returns `None` for anything that is not a timing request. The request's
/// transmit timestamp (bytes 24..32) is echoed as the reference timestamp;
/// a short request contributes whatever bytes it has.
pub fn build_timing_response(request: &[u8], now: WallClock) -> Option<[u8; 32]> {
    if request.len() < MIN_PACKET_LEN || request[1] & 0x7f != TIMING_REQUEST {
        return None;
    }

    let mut response = [0u8; 32];
    response[0] = 0x80;
    response[1] = TIMING_RESPONSE | MARKER;
    response[2] = 0x00;
    response[3] = 0x07;

    if request.len() > 24 {
        let echoed = &request[24..request.len().min(32)];
        response[8..8 + echoed.len()].copy_from_slice(echoed);
    }

    let wall = now.to_be_bytes();
    response[16..24].copy_from_slice(&wall);
    response[24..32].copy_from_slice(&wall);
    Some(response)
}

/// Background task answering timing requests on the timing socket.
///
/// Aborted when dropped.
pub struct TimingResponder {
    handle: JoinHandle<()>,
}

impl TimingResponder {
    /// Start answering requests arriving on `socket`.
    ///
    /// `position` is the send path's published RTP position; the responder
    /// only ever reads snapshots of it.
    pub fn spawn(socket: Arc<UdpSocket>, position: watch::Receiver<RtpSnapshot>) -> Self {
        let handle = tokio::spawn(async move {
            Self::run_loop(socket, position).await;
        });
        Self { handle }
    }

    /// Whether the loop has ended (receive error or abort).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    async fn run_loop(socket: Arc<UdpSocket>, position: watch::Receiver<RtpSnapshot>) {
        let mut buf = [0u8; 128];
        loop {
            trace!("Waiting for request on timing port");
            let (len, peer) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("Timing responder stopped: failed to read datagram ({})", e);
                    return;
                }
            };

            if len < MIN_PACKET_LEN {
                warn!("Timing packet too small ({} bytes)", len);
                continue;
            }

            match build_timing_response(&buf[..len], WallClock::now()) {
                Some(response) => {
                    let snapshot = *position.borrow();
                    debug!(
                        "Timing request from {} (stream at seq={}, rtptime={})",
                        peer, snapshot.sequence, snapshot.timestamp
                    );
                    let sent = match socket.peer_addr() {
                        Ok(_) => socket.send(&response).await,
                        Err(_) => socket.send_to(&response, peer).await,
                    };
                    if let Err(e) = sent {
                        warn!("Failed to send timing response: {}", e);
                    }
                }
                None => debug!("Ignoring timing packet type 0x{:02x}", buf[1] & 0x7f),
            }
        }
    }
}

impl Drop for TimingResponder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
