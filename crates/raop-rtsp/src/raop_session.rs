//! RAOP control session bookkeeping.
//!
//! Tracks where the handshake stands (OPTIONS → ANNOUNCE → SETUP → RECORD)
//! together with the identifiers every request carries: sequence number,
//! server session id and the client instance id.

use raop_core::error::{ProtocolError, Result};
use raop_core::ProtocolVersion;
use std::net::{IpAddr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::request::RequestEnvelope;

/// Handshake progress on the current control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaopSessionState {
    /// No control connection.
    Disconnected,
    /// TCP connected, ready for OPTIONS/ANNOUNCE.
    Connected,
    /// ANNOUNCE accepted.
    Announced,
    /// SETUP accepted, server ports known.
    SetupComplete,
    /// RECORD accepted, audio may flow.
    Recording,
}

/// Ports extracted from the SETUP response Transport header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPorts {
    /// Receiver's audio data port (TCP stream or RTP).
    pub server_port: u16,
    /// Receiver's control port, UDP only.
    pub control_port: Option<u16>,
    /// Receiver's timing port, UDP only.
    pub timing_port: Option<u16>,
}

/// Local framing advertised in the SETUP Transport header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRequest {
    Tcp,
    Udp { control_port: u16, timing_port: u16 },
}

impl TransportRequest {
    pub fn header_value(&self) -> String {
        match self {
            Self::Tcp => "RTP/AVP/TCP;unicast;interleaved=0-1;mode=record".to_string(),
            Self::Udp {
                control_port,
                timing_port,
            } => format!(
                "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={};timing_port={}",
                control_port, timing_port
            ),
        }
    }
}

/// Per-engine session state. Survives reconnects; `attach` refreshes the
/// per-connection parts.
pub struct RaopSession {
    state: RaopSessionState,
    version: ProtocolVersion,
    user_agent: String,
    local_ip: Option<IpAddr>,
    remote_ip: Option<IpAddr>,
    client_session_id: String,
    server_session_id: String,
    next_cseq: u32,
    /// Generated on the first connect, then kept for the engine's lifetime.
    instance_id: Option<String>,
    options_received: bool,
    encryption_required: bool,
    audio_latency: Option<u32>,
    ports: Option<ServerPorts>,
}

impl RaopSession {
    pub fn new(version: ProtocolVersion, user_agent: impl Into<String>) -> Self {
        Self {
            state: RaopSessionState::Disconnected,
            version,
            user_agent: user_agent.into(),
            local_ip: None,
            remote_ip: None,
            client_session_id: String::new(),
            server_session_id: String::new(),
            next_cseq: 1,
            instance_id: None,
            options_received: false,
            encryption_required: false,
            audio_latency: None,
            ports: None,
        }
    }

    /// Record a fresh control connection.
    ///
    /// Derives a new client session id from `now`, generates the instance
    /// id if this is the first connection, and restarts CSeq at 1.
    pub fn attach(&mut self, local: SocketAddr, remote: SocketAddr, now: SystemTime) {
        let millis = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        if self.instance_id.is_none() {
            let seed = format!("{} {} {}", millis, local, remote);
            self.instance_id = Some(raop_crypto::instance_id(seed.as_bytes()));
        }

        self.client_session_id = (millis as u32).to_string();
        self.local_ip = Some(local.ip());
        self.remote_ip = Some(remote.ip());
        self.server_session_id.clear();
        self.next_cseq = 1;
        self.ports = None;
        self.audio_latency = None;
        self.state = RaopSessionState::Connected;
    }

    /// Forget the control connection. CSeq restarts at 1.
    pub fn detach(&mut self) {
        self.state = RaopSessionState::Disconnected;
        self.server_session_id.clear();
        self.next_cseq = 1;
    }

    /// Take the next CSeq (post-increment).
    pub fn next_cseq(&mut self) -> u32 {
        let cseq = self.next_cseq;
        self.next_cseq = self.next_cseq.wrapping_add(1);
        cseq
    }

    /// Standard headers for a request with sequence number `cseq`.
    pub fn envelope(&self, cseq: u32) -> RequestEnvelope<'_> {
        RequestEnvelope {
            cseq,
            session: Some(self.server_session_id.as_str()),
            user_agent: &self.user_agent,
            instance_id: self.instance_id.as_deref().unwrap_or_default(),
        }
    }

    /// `rtsp://<local-ip>/<client-session-id>`.
    pub fn record_url(&self) -> String {
        let host = match self.local_ip {
            Some(IpAddr::V6(ip)) => format!("[{}]", ip),
            Some(ip) => ip.to_string(),
            None => "0.0.0.0".to_string(),
        };
        format!("rtsp://{}/{}", host, self.client_session_id)
    }

    /// Transition to Announced state (after ANNOUNCE).
    pub fn set_announced(&mut self) -> Result<()> {
        match self.state {
            RaopSessionState::Connected => {
                self.state = RaopSessionState::Announced;
                Ok(())
            }
            other => Err(ProtocolError::InvalidResponse(format!(
                "Cannot announce from state {:?}",
                other
            ))
            .into()),
        }
    }

    /// Record the SETUP outcome and transition to SetupComplete.
    pub fn set_setup_complete(&mut self, server_session_id: &str, ports: ServerPorts) -> Result<()> {
        if self.state != RaopSessionState::Announced {
            return Err(ProtocolError::InvalidResponse(format!(
                "Cannot complete SETUP from state {:?}",
                self.state
            ))
            .into());
        }
        self.server_session_id = server_session_id.to_string();
        self.ports = Some(ports);
        self.state = RaopSessionState::SetupComplete;
        Ok(())
    }

    /// Transition to Recording state (after RECORD).
    pub fn set_recording(&mut self, audio_latency: Option<u32>) -> Result<()> {
        if self.state != RaopSessionState::SetupComplete {
            return Err(ProtocolError::InvalidResponse(format!(
                "Cannot record from state {:?}",
                self.state
            ))
            .into());
        }
        self.audio_latency = audio_latency;
        self.state = RaopSessionState::Recording;
        Ok(())
    }

    pub fn clear_server_session_id(&mut self) {
        self.server_session_id.clear();
    }

    pub fn set_options_received(&mut self, encryption_required: bool) {
        self.options_received = true;
        self.encryption_required = encryption_required;
    }

    pub fn state(&self) -> RaopSessionState {
        self.state
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip
    }

    pub fn remote_ip(&self) -> Option<IpAddr> {
        self.remote_ip
    }

    pub fn client_session_id(&self) -> &str {
        &self.client_session_id
    }

    pub fn server_session_id(&self) -> &str {
        &self.server_session_id
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    pub fn options_received(&self) -> bool {
        self.options_received
    }

    pub fn encryption_required(&self) -> bool {
        self.encryption_required
    }

    pub fn audio_latency(&self) -> Option<u32> {
        self.audio_latency
    }

    pub fn ports(&self) -> Option<ServerPorts> {
        self.ports
    }
}

/// Parse a SETUP response Transport header.
///
/// `server_port` is mandatory; `control_port` and `timing_port` only appear
/// for the UDP transport.
pub fn parse_transport_header(header: &str) -> Result<ServerPorts> {
    let mut server_port: Option<u16> = None;
    let mut control_port: Option<u16> = None;
    let mut timing_port: Option<u16> = None;

    for part in header.split(';') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("server_port=") {
            server_port = value.parse().ok();
        } else if let Some(value) = part.strip_prefix("control_port=") {
            control_port = value.parse().ok();
        } else if let Some(value) = part.strip_prefix("timing_port=") {
            timing_port = value.parse().ok();
        }
    }

    let server_port = server_port.ok_or(ProtocolError::MissingTransportField("server_port"))?;

    Ok(ServerPorts {
        server_port,
        control_port,
        timing_port,
    })
}
