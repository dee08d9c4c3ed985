//! RAOP output engine.
//!
//! Owns the control session, the audio transport and the timing responder
//! for one receiver, and maps host lifecycle signals onto the protocol:
//! `start`/`resume` run the OPTIONS → ANNOUNCE → SETUP → RECORD handshake,
//! `pause`/`stop` FLUSH and TEARDOWN.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use async_trait::async_trait;
use raop_audio::AudioTransport;
use raop_core::error::{ProtocolError, Result};
use raop_core::{EngineConfig, PcmFormat, ProtocolVersion, RaopTarget};
use raop_crypto::FrameCipher;
use raop_rtsp::{ControlSession, RtspConnection, ServerPorts, TransportRequest};
use raop_timing::TimingResponder;
use tracing::{debug, info, warn};

use crate::state::EngineState;
use crate::traits::{AudioSink, Lifecycle, VolumeControl};
use crate::volume::volume_parameter;

/// Streams PCM to one RAOP receiver.
pub struct RaopOutput {
    target: RaopTarget,
    config: EngineConfig,
    state: EngineState,
    control: ControlSession<RtspConnection>,
    /// Created up front for TCP; bound at the first connect for UDP and
    /// kept for the engine's lifetime.
    audio: Option<AudioTransport>,
    cipher: FrameCipher,
    volume: f32,
    timing: Option<TimingResponder>,
}

impl RaopOutput {
    pub fn new(target: RaopTarget, config: EngineConfig) -> Self {
        let audio = match target.version {
            ProtocolVersion::Legacy => Some(AudioTransport::legacy()),
            ProtocolVersion::Modern => None,
        };
        Self {
            control: ControlSession::new(target.version, config.user_agent.clone()),
            target,
            config,
            state: EngineState::Idle,
            audio,
            cipher: FrameCipher::with_session_key(),
            volume: 1.0,
            timing: None,
        }
    }

    /// Engine for a `raop://host:port` or `raopt://host:port` name.
    pub fn open(name: &str, config: EngineConfig) -> Result<Self> {
        let target = RaopTarget::parse(name)?;
        info!("RAOP output for {}", target);
        Ok(Self::new(target, config))
    }

    pub fn target(&self) -> &RaopTarget {
        &self.target
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Receiver ports learned at SETUP.
    pub fn server_ports(&self) -> Option<ServerPorts> {
        self.control.session().ports()
    }

    /// `Audio-Latency` reported at RECORD, in frames.
    pub fn audio_latency(&self) -> Option<u32> {
        self.control.session().audio_latency()
    }

    pub fn encryption_required(&self) -> bool {
        self.control.session().encryption_required()
    }

    /// Audio time sent since the last RECORD.
    pub fn playback_position(&self) -> Duration {
        self.audio
            .as_ref()
            .map(|audio| audio.snapshot().position())
            .unwrap_or_default()
    }

    /// Local UDP ports of the modern transport, once bound.
    pub fn local_ports(&self) -> Option<raop_audio::LocalPorts> {
        self.audio.as_ref().and_then(|audio| audio.local_ports())
    }

    pub async fn activate(&mut self) -> Result<()> {
        debug!("activate ({})", self.target);
        Ok(())
    }

    /// Connect and negotiate. A no-op while already negotiated.
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            EngineState::Idle | EngineState::Paused => self.negotiate().await,
            _ => Ok(()),
        }
    }

    /// Reconnect after `pause`. A no-op unless paused.
    pub async fn resume(&mut self) -> Result<()> {
        match self.state {
            EngineState::Paused => self.negotiate().await,
            _ => Ok(()),
        }
    }

    /// FLUSH and TEARDOWN; the receiver is released until `resume`.
    pub async fn pause(&mut self) -> Result<()> {
        if self.state != EngineState::Negotiated {
            return Ok(());
        }

        if let Err(e) = self.flush().await {
            warn!("FLUSH on pause failed: {}", e);
        }
        if let Err(e) = self.teardown().await {
            warn!("TEARDOWN on pause failed: {}", e);
        }
        self.state = EngineState::Paused;
        Ok(())
    }

    /// FLUSH then TEARDOWN, both attempted. Returns the TEARDOWN result.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            EngineState::Negotiated => {
                if let Err(e) = self.flush().await {
                    warn!("FLUSH on stop failed: {}", e);
                }
                let result = self.teardown().await;
                self.state = EngineState::Idle;
                result
            }
            EngineState::Paused => {
                self.state = EngineState::Idle;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Drop the connection locally, without telling the receiver.
    pub async fn deactivate(&mut self) -> Result<()> {
        debug!("deactivate ({})", self.target);
        self.reset_connection();
        self.state = EngineState::Idle;
        Ok(())
    }

    pub async fn push_audio(&mut self, pcm: &[u8], format: &PcmFormat) -> Result<()> {
        format.validate()?;
        if !self.state.accepts_audio() {
            return Err(ProtocolError::NotConnected.into());
        }
        let audio = self.audio.as_mut().ok_or(ProtocolError::NotConnected)?;
        audio.add_audio(&self.cipher, pcm, format).await
    }

    pub async fn drain(&mut self) -> Result<()> {
        if !self.state.accepts_audio() {
            return Err(ProtocolError::NotConnected.into());
        }
        let audio = self.audio.as_mut().ok_or(ProtocolError::NotConnected)?;
        audio.drain(&self.cipher).await
    }

    /// Remember `volume` and send it as SET_PARAMETER.
    ///
    /// The value is stored even when sending fails.
    pub async fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.volume = volume;
        let parameter = volume_parameter(volume);
        debug!("set volume {} ({})", volume, parameter.trim_end());
        self.control.set_parameter(&parameter).await
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// GET_PARAMETER passthrough; returns the response body.
    pub async fn get_parameter(&mut self, name: &str) -> Result<String> {
        let request = if name.ends_with("\r\n") {
            name.to_string()
        } else {
            format!("{}\r\n", name)
        };
        self.control.get_parameter(&request).await
    }

    async fn negotiate(&mut self) -> Result<()> {
        self.state = EngineState::Connecting;
        match self.connect().await {
            Ok(()) => {
                info!("Negotiated with {}", self.target);
                self.state = EngineState::Negotiated;
                Ok(())
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", self.target, e);
                self.reset_connection();
                self.state = EngineState::Idle;
                Err(e)
            }
        }
    }

    async fn connect(&mut self) -> Result<()> {
        let mut connection =
            RtspConnection::connect(&self.target.host, self.target.port, self.config.connect_timeout)
                .await?;
        connection.set_response_timeout(self.config.response_timeout);
        self.control.attach(connection)?;

        let session = self.control.session();
        let local_ip = session.local_ip().ok_or(ProtocolError::NotConnected)?;
        let remote_ip = session.remote_ip().ok_or(ProtocolError::NotConnected)?;

        if !self.control.session().options_received() {
            self.control.options().await?;
        }
        self.control.announce().await?;

        let transport_request = self.prepare_transport(local_ip).await?;
        let ports = self.control.setup(transport_request).await?;
        if let (Some(timing_port), Some(audio)) = (ports.timing_port, self.audio.as_ref()) {
            audio.connect_timing(remote_ip, timing_port).await?;
        }
        self.ensure_timing_responder();

        self.control.record().await?;

        let audio = self.audio.as_mut().ok_or(ProtocolError::NotConnected)?;
        audio.begin_record();
        audio
            .open_data_path(
                remote_ip,
                ports.server_port,
                ports.control_port,
                self.config.connect_timeout,
            )
            .await
    }

    /// Bind the UDP sockets on first use and describe them for SETUP.
    async fn prepare_transport(&mut self, local_ip: IpAddr) -> Result<TransportRequest> {
        if self.audio.is_none() {
            let bind_ip = match local_ip {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            };
            self.audio = Some(AudioTransport::modern(bind_ip, &self.config).await?);
        }

        Ok(match self.local_ports() {
            Some(ports) => TransportRequest::Udp {
                control_port: ports.control,
                timing_port: ports.timing,
            },
            None => TransportRequest::Tcp,
        })
    }

    /// One responder per engine, started at the first UDP SETUP.
    fn ensure_timing_responder(&mut self) {
        if self.timing.is_some() {
            return;
        }
        let Some(audio) = self.audio.as_ref() else {
            return;
        };
        if let (Some(socket), Some(position)) = (audio.timing_socket(), audio.position_receiver()) {
            debug!("Starting timing responder");
            self.timing = Some(TimingResponder::spawn(socket, position));
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let position = self
            .audio
            .as_ref()
            .map(|audio| audio.snapshot())
            .unwrap_or_default();
        self.control.flush(position.sequence, position.timestamp).await?;
        if let Some(audio) = self.audio.as_mut() {
            audio.clear_buffer();
        }
        Ok(())
    }

    /// TEARDOWN; the connection is dropped locally either way.
    async fn teardown(&mut self) -> Result<()> {
        let result = self.control.teardown().await;
        self.reset_connection();
        result
    }

    fn reset_connection(&mut self) {
        self.control.reset();
        if let Some(audio) = self.audio.as_mut() {
            audio.release();
        }
    }
}

#[async_trait]
impl AudioSink for RaopOutput {
    async fn push_audio(&mut self, pcm: &[u8], format: &PcmFormat) -> Result<()> {
        RaopOutput::push_audio(self, pcm, format).await
    }

    async fn drain(&mut self) -> Result<()> {
        RaopOutput::drain(self).await
    }
}

#[async_trait]
impl Lifecycle for RaopOutput {
    async fn activate(&mut self) -> Result<()> {
        RaopOutput::activate(self).await
    }

    async fn start(&mut self) -> Result<()> {
        RaopOutput::start(self).await
    }

    async fn pause(&mut self) -> Result<()> {
        RaopOutput::pause(self).await
    }

    async fn resume(&mut self) -> Result<()> {
        RaopOutput::resume(self).await
    }

    async fn stop(&mut self) -> Result<()> {
        RaopOutput::stop(self).await
    }

    async fn deactivate(&mut self) -> Result<()> {
        RaopOutput::deactivate(self).await
    }
}

#[async_trait]
impl VolumeControl for RaopOutput {
    async fn set_volume(&mut self, volume: f32) -> Result<()> {
        RaopOutput::set_volume(self, volume).await
    }

    fn volume(&self) -> f32 {
        RaopOutput::volume(self)
    }
}
