//! Engine lifecycle state.

use std::fmt;

/// Where the engine is in its connect/stream/teardown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No control connection.
    #[default]
    Idle,
    /// Handshake in progress.
    Connecting,
    /// RECORD acknowledged; audio may be pushed.
    Negotiated,
    /// Torn down by `pause`, waiting for `resume`.
    Paused,
}

impl EngineState {
    pub fn accepts_audio(&self) -> bool {
        matches!(self, Self::Negotiated)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Negotiated => "negotiated",
            Self::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(EngineState::default(), EngineState::Idle);
    }

    #[test]
    fn only_negotiated_accepts_audio() {
        assert!(EngineState::Negotiated.accepts_audio());
        assert!(!EngineState::Idle.accepts_audio());
        assert!(!EngineState::Connecting.accepts_audio());
        assert!(!EngineState::Paused.accepts_audio());
    }

    #[test]
    fn display_names() {
        assert_eq!(EngineState::Paused.to_string(), "paused");
    }
}
