//! Fixed-size PCM accumulation buffer.
//!
//! Incoming PCM is gathered here in wire byte order until a whole packet's
//! worth is present.

use raop_core::codec::{BYTES_PER_FRAME, FRAMES_PER_PACKET, LEGACY_FRAMES_PER_PACKET};
use raop_core::ProtocolVersion;

/// Byte capacity of the buffer for each protocol version.
pub fn packet_bytes(version: ProtocolVersion) -> usize {
    match version {
        ProtocolVersion::Legacy => LEGACY_FRAMES_PER_PACKET as usize * BYTES_PER_FRAME,
        ProtocolVersion::Modern => FRAMES_PER_PACKET as usize * BYTES_PER_FRAME,
    }
}

/// Gathers big-endian PCM until a packet is full.
#[derive(Debug)]
pub struct AccumulationBuffer {
    data: Vec<u8>,
    fullness: usize,
}

impl AccumulationBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            fullness: 0,
        }
    }

    pub fn for_version(version: ProtocolVersion) -> Self {
        Self::new(packet_bytes(version))
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn fullness(&self) -> usize {
        self.fullness
    }

    pub fn is_empty(&self) -> bool {
        self.fullness == 0
    }

    pub fn is_full(&self) -> bool {
        self.fullness == self.data.len()
    }

    /// Copy as much of `pcm` as fits, swapping byte pairs when `swap` is set.
    ///
    /// Only whole 16-bit samples are taken. Returns the number of input
    /// bytes consumed.
    pub fn fill(&mut self, pcm: &[u8], swap: bool) -> usize {
        let room = self.data.len() - self.fullness;
        let chunk = pcm.len().min(room) & !1;
        let dest = &mut self.data[self.fullness..self.fullness + chunk];

        if swap {
            for (out, sample) in dest.chunks_exact_mut(2).zip(pcm[..chunk].chunks_exact(2)) {
                out[0] = sample[1];
                out[1] = sample[0];
            }
        } else {
            dest.copy_from_slice(&pcm[..chunk]);
        }

        self.fullness += chunk;
        chunk
    }

    /// Zero the unused tail and mark the buffer full.
    pub fn pad_to_capacity(&mut self) {
        self.data[self.fullness..].fill(0);
        self.fullness = self.data.len();
    }

    /// Bytes accumulated so far.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.fullness]
    }

    pub fn clear(&mut self) {
        self.fullness = 0;
    }
}
