//! Uncompressed ALAC frame encoding.
//!
//! Receivers only accept ALAC, so PCM is wrapped in an ALAC frame that
//! flags its payload as uncompressed: a 55-bit header followed by every
//! 16-bit sample. The trailing bit offset means samples do not land on
//! byte boundaries.

use crate::bitwriter::BitWriter;
use raop_core::codec::BYTES_PER_FRAME;

/// Header bytes added around `4n` bytes of samples (55 bits, rounded up).
pub const ALAC_HEADER_BYTES: usize = 7;

/// Size of the encoded frame for `frame_count` stereo frames.
pub fn encoded_len(frame_count: usize) -> usize {
    frame_count * BYTES_PER_FRAME + ALAC_HEADER_BYTES
}

/// Encode big-endian stereo 16-bit PCM as one uncompressed ALAC frame.
///
/// The input length should be a multiple of four; a trailing partial
/// frame is not counted in the header but its whole samples are still
/// written.
pub fn encode_frame(pcm_be: &[u8]) -> Vec<u8> {
    let sample_count = pcm_be.len() / BYTES_PER_FRAME;
    let mut writer = BitWriter::new(encoded_len(sample_count));

    writer.write(1, 3); // channels - 1
    writer.write(0, 16);
    writer.write(1, 1); // has size
    writer.write(0, 2);
    writer.write(1, 1); // not compressed
    writer.write(sample_count as u32, 32);

    for sample in pcm_be.chunks_exact(2).take(sample_count * 2) {
        writer.write(u16::from_be_bytes([sample[0], sample[1]]) as u32, 16);
    }

    writer.into_bytes()
}
