//! PCM format definitions for RAOP streaming.
//!
//! The wire format is fixed: 44.1 kHz, two channels, 16-bit big-endian.
//! Callers may hand over little-endian data, which is swapped on the way in.

use crate::error::{Error, Result};

/// Sample rate every RAOP receiver expects.
pub const SAMPLE_RATE: u32 = 44100;

/// Channel count every RAOP receiver expects.
pub const CHANNELS: u8 = 2;

/// Bits per sample on the wire.
pub const BITS_PER_SAMPLE: u8 = 16;

/// Bytes occupied by one stereo 16-bit sample frame.
pub const BYTES_PER_FRAME: usize = 4;

/// Frames carried by one RTP packet on the UDP transport.
pub const FRAMES_PER_PACKET: u32 = 352;

/// Frames carried by one framed chunk on the TCP transport.
pub const LEGACY_FRAMES_PER_PACKET: u32 = 4096;

/// Byte order of incoming 16-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    SignedBigEndian,
    SignedLittleEndian,
}

impl SampleFormat {
    /// Byte order of the host.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::SignedBigEndian
        } else {
            Self::SignedLittleEndian
        }
    }

    pub fn needs_swap(&self) -> bool {
        matches!(self, Self::SignedLittleEndian)
    }
}

/// Declared format of a chunk of PCM handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    pub sample_format: SampleFormat,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::native(),
        }
    }
}

impl PcmFormat {
    pub fn with_sample_format(sample_format: SampleFormat) -> Self {
        Self {
            sample_format,
            ..Self::default()
        }
    }

    /// Reject anything other than 44.1 kHz stereo 16-bit.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(Error::InvalidMediaFormat(format!(
                "sample rate {} (expected {})",
                self.sample_rate, SAMPLE_RATE
            )));
        }
        if self.channels != CHANNELS {
            return Err(Error::InvalidMediaFormat(format!(
                "{} channels (expected {})",
                self.channels, CHANNELS
            )));
        }
        if self.bits_per_sample != BITS_PER_SAMPLE {
            return Err(Error::InvalidMediaFormat(format!(
                "{} bits per sample (expected {})",
                self.bits_per_sample, BITS_PER_SAMPLE
            )));
        }
        Ok(())
    }
}
