//! RTP audio and sync packet formatting.

use raop_core::codec::FRAMES_PER_PACKET;
use raop_core::error::{Error, Result};
use raop_core::RtpSnapshot;
use raop_timing::WallClock;

/// RTP payload types used by RAOP.
pub mod payload_types {
    pub const TIMING_REQUEST: u8 = 82;
    pub const TIMING_RESPONSE: u8 = 83;
    pub const SYNC: u8 = 84;
    pub const AUDIO: u8 = 96;
}

/// Audio packets between two sync packets.
pub const SYNC_INTERVAL: u64 = 126;

/// Size of a serialized sync packet.
pub const SYNC_PACKET_LEN: usize = 20;

/// Size of the frame header preceding each chunk on the TCP transport.
pub const LEGACY_HEADER_LEN: usize = 16;

/// RTP header (12 bytes).
///
/// RAOP never sets padding, extension or CSRCs, and leaves the SSRC zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Header for an audio packet.
    pub fn audio(sequence: u16, timestamp: u32) -> Self {
        Self {
            marker: false,
            payload_type: payload_types::AUDIO,
            sequence,
            timestamp,
            ssrc: 0,
        }
    }

    pub fn with_marker(mut self, marker: bool) -> Self {
        self.marker = marker;
        self
    }

    pub fn serialize(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        // V=2, no padding, no extension, no CSRCs
        buf[0] = 0x80;
        buf[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7f);
        buf[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        buf
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(Error::InvalidParameters(format!(
                "RTP packet too short ({} bytes)",
                data.len()
            )));
        }
        if data[0] >> 6 != 2 {
            return Err(Error::InvalidParameters(format!(
                "unsupported RTP version {}",
                data[0] >> 6
            )));
        }

        Ok(Self {
            marker: data[1] & 0x80 != 0,
            payload_type: data[1] & 0x7f,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }
}

/// Sequence, timestamp and marker state of the outgoing RTP stream.
#[derive(Debug, Clone)]
pub struct RtpState {
    sequence: u16,
    timestamp: u32,
    marker: bool,
    packets_since_record: u64,
}

impl Default for RtpState {
    fn default() -> Self {
        Self::new()
    }
}

impl RtpState {
    /// Fresh stream: sequence 0, timestamp 0, marker on the first packet.
    pub fn new() -> Self {
        Self {
            sequence: 0,
            timestamp: 0,
            marker: true,
            packets_since_record: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Header for the next packet to be sent.
    pub fn next_header(&self) -> RtpHeader {
        RtpHeader::audio(self.sequence, self.timestamp).with_marker(self.marker)
    }

    /// Account for one sent packet.
    ///
    /// Returns `true` when a sync packet is due after it.
    pub fn advance(&mut self) -> bool {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(FRAMES_PER_PACKET);
        self.marker = false;
        self.packets_since_record += 1;
        self.packets_since_record % SYNC_INTERVAL == 0
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn packets_since_record(&self) -> u64 {
        self.packets_since_record
    }

    pub fn snapshot(&self) -> RtpSnapshot {
        RtpSnapshot {
            sequence: self.sequence,
            timestamp: self.timestamp,
        }
    }
}

/// Sync packet tying an RTP timestamp to the wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SyncPacket {
    /// Set only on the first sync of a session.
    pub first: bool,
    /// Timestamp of the packet just sent.
    pub timestamp: u32,
    pub wall: WallClock,
}

impl SyncPacket {
    pub fn serialize(&self) -> [u8; SYNC_PACKET_LEN] {
        let mut buf = [0u8; SYNC_PACKET_LEN];
        buf[0] = 0x80;
        buf[1] = payload_types::SYNC | if self.first { 0x80 } else { 0x00 };
        buf[2] = 0x00;
        buf[3] = 0x07;
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..16].copy_from_slice(&self.wall.to_be_bytes());
        buf[16..20].copy_from_slice(&self.timestamp.wrapping_add(FRAMES_PER_PACKET).to_be_bytes());
        buf
    }
}

/// Header preceding each encoded chunk on the TCP transport.
///
/// Bytes 2..4 carry the chunk length plus 12, big-endian.
pub fn legacy_frame_header(payload_len: usize) -> [u8; LEGACY_HEADER_LEN] {
    let mut header = [0u8; LEGACY_HEADER_LEN];
    header[0] = 0x24;
    header[1] = 0x00;
    header[2..4].copy_from_slice(&((payload_len + 12) as u16).to_be_bytes());
    header[4] = 0xf0;
    header[5] = 0xff;
    header
}
