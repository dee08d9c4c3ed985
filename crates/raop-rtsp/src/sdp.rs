//! SDP builder for RAOP ANNOUNCE requests.
//!
//! Declares uncompressed-ALAC parameters and the fixed encryption key
//! material for the receiver's audio pipeline.

use raop_crypto::keys::{session_iv_b64, RSA_WRAPPED_SESSION_KEY};
use std::net::IpAddr;

/// Builder for RAOP ANNOUNCE SDP bodies.
pub struct SdpBuilder {
    /// Client session id, also the last path segment of the record URL.
    session_id: String,
    local_ip: IpAddr,
    remote_ip: IpAddr,
    /// 4096 for the TCP transport, 352 for RTP.
    frames_per_packet: u32,
}

impl SdpBuilder {
    pub fn new(
        session_id: impl Into<String>,
        local_ip: IpAddr,
        remote_ip: IpAddr,
        frames_per_packet: u32,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            local_ip,
            remote_ip,
            frames_per_packet,
        }
    }

    /// Build the complete SDP body.
    pub fn build(&self) -> String {
        // ALAC fmtp: frames, compat, bit depth, pb, mb, kb, channels,
        // max run, max frame bytes, avg bitrate, sample rate
        let sdp = format!(
            "v=0\r\n\
             o=iTunes {} 0 IN {} {}\r\n\
             s=iTunes\r\n\
             c=IN {} {}\r\n\
             t=0 0\r\n\
             m=audio 0 RTP/AVP 96\r\n\
             a=rtpmap:96 AppleLossless\r\n\
             a=fmtp:96 {} 0 16 40 10 14 2 255 0 0 44100\r\n\
             a=rsaaeskey:{}\r\n\
             a=aesiv:{}\r\n",
            self.session_id,
            addr_type(&self.local_ip),
            self.local_ip,
            addr_type(&self.remote_ip),
            self.remote_ip,
            self.frames_per_packet,
            RSA_WRAPPED_SESSION_KEY,
            session_iv_b64(),
        );

        tracing::debug!("ANNOUNCE SDP:\n{}", sdp);
        sdp
    }
}

fn addr_type(ip: &IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "IP4",
        IpAddr::V6(_) => "IP6",
    }
}
