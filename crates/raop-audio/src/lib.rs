//! # raop-audio
//!
//! Audio path of the RAOP output engine: PCM accumulation, uncompressed
//! ALAC framing, RTP and sync packets, UDP port allocation and real-time
//! pacing.

pub mod bitwriter;
pub mod buffer;
pub mod encoder;
pub mod pacer;
pub mod ports;
pub mod rtp;
mod transport;

pub use bitwriter::BitWriter;
pub use buffer::AccumulationBuffer;
pub use encoder::encode_frame;
pub use pacer::Pacer;
pub use ports::{LocalPorts, UdpPortAllocator};
pub use rtp::{RtpHeader, RtpState, SyncPacket};
pub use transport::{AudioTransport, Framing, ModernLink};
