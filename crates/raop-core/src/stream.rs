//! Protocol version selection and engine configuration.

use crate::codec::{FRAMES_PER_PACKET, LEGACY_FRAMES_PER_PACKET, SAMPLE_RATE};
use crate::error::Error;
use std::time::Duration;

/// RAOP transport generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// Framed audio over a dedicated TCP connection (`raopt://`).
    Legacy = 0,
    /// RTP over UDP with a timing responder (`raop://`).
    Modern = 1,
}

impl ProtocolVersion {
    /// Frames accumulated before one encoded packet is sent.
    pub fn frames_per_packet(&self) -> u32 {
        match self {
            Self::Legacy => LEGACY_FRAMES_PER_PACKET,
            Self::Modern => FRAMES_PER_PACKET,
        }
    }
}

impl TryFrom<u32> for ProtocolVersion {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Modern),
            other => Err(Error::Internal(format!(
                "unsupported protocol version {}",
                other
            ))),
        }
    }
}

/// Position of the RTP stream, published by the send path after each packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RtpSnapshot {
    pub sequence: u16,
    pub timestamp: u32,
}

impl RtpSnapshot {
    /// Audio time represented by the timestamp, ignoring wraparound.
    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.timestamp as f64 / SAMPLE_RATE as f64)
    }
}

/// Tunables for one output engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on the control connection handshake.
    pub connect_timeout: Duration,
    /// Upper bound on reading one control response. `None` waits forever.
    pub response_timeout: Option<Duration>,
    /// First local UDP port tried for RTP audio. Control and timing follow it.
    pub preferred_audio_port: u16,
    /// Ports tried per socket before giving up.
    pub port_scan_attempts: u32,
    /// How far the sender may run ahead of real time before it sleeps.
    pub pacing_lead: Duration,
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: None,
            preferred_audio_port: 6000,
            port_scan_attempts: 4096,
            pacing_lead: Duration::from_secs(1),
            user_agent: "BlueTune/1.0".to_string(),
        }
    }
}

impl EngineConfig {
    /// Builder-style override for the first local UDP port.
    pub fn with_preferred_audio_port(mut self, port: u16) -> Self {
        self.preferred_audio_port = port;
        self
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn with_pacing_lead(mut self, lead: Duration) -> Self {
        self.pacing_lead = lead;
        self
    }
}
