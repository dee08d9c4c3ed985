//! Wall-clock timestamps as carried in RAOP timing and sync packets.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix wall-clock time split into whole seconds and nanoseconds, both
/// truncated to 32 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallClock {
    pub seconds: u32,
    pub nanos: u32,
}

impl WallClock {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
        Self {
            seconds: since_epoch.as_secs() as u32,
            nanos: since_epoch.subsec_nanos(),
        }
    }

    /// Big-endian seconds followed by big-endian nanoseconds.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.seconds.to_be_bytes());
        out[4..].copy_from_slice(&self.nanos.to_be_bytes());
        out
    }
}
