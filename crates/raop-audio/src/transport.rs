//! Audio data path for both RAOP transports.
//!
//! PCM is accumulated into packet-sized chunks, encoded as uncompressed
//! ALAC, encrypted and handed to the active framing: length-prefixed chunks
//! on a dedicated TCP connection (legacy), or RTP datagrams with periodic
//! sync packets (modern).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use std::{fmt, io};

use raop_core::codec::{PcmFormat, FRAMES_PER_PACKET};
use raop_core::error::{ProtocolError, Result};
use raop_core::{EngineConfig, ProtocolVersion, RtpSnapshot};
use raop_crypto::FrameCipher;
use raop_timing::WallClock;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::buffer::AccumulationBuffer;
use crate::encoder::encode_frame;
use crate::pacer::Pacer;
use crate::ports::{LocalPorts, UdpPortAllocator};
use crate::rtp::{legacy_frame_header, RtpState, SyncPacket, LEGACY_HEADER_LEN};

/// UDP side of the modern transport.
///
/// Sockets are bound once and live as long as the engine. The first-sync
/// flag is never reset, so only the engine's first sync packet carries it.
pub struct ModernLink {
    rtp: UdpSocket,
    control: UdpSocket,
    timing: Arc<UdpSocket>,
    ports: LocalPorts,
    rtp_state: RtpState,
    pacer: Pacer,
    first_sync_pending: bool,
    data_connected: bool,
    control_connected: bool,
    position: watch::Sender<RtpSnapshot>,
}

impl ModernLink {
    async fn bind(bind_ip: IpAddr, config: &EngineConfig) -> Result<Self> {
        let allocator = UdpPortAllocator::new(bind_ip, config.port_scan_attempts);

        let (rtp, audio) = allocator.bind(config.preferred_audio_port).await?;
        let (control, control_port) = allocator.bind(audio.saturating_add(1)).await?;
        let (timing, timing_port) = allocator.bind(control_port.saturating_add(1)).await?;

        let ports = LocalPorts {
            audio,
            control: control_port,
            timing: timing_port,
        };
        info!(
            "UDP ports: audio={} control={} timing={}",
            ports.audio, ports.control, ports.timing
        );

        let (position, _) = watch::channel(RtpSnapshot::default());
        Ok(Self {
            rtp,
            control,
            timing: Arc::new(timing),
            ports,
            rtp_state: RtpState::new(),
            pacer: Pacer::new(config.pacing_lead),
            first_sync_pending: true,
            data_connected: false,
            control_connected: false,
            position,
        })
    }

    async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if !self.data_connected {
            return Err(ProtocolError::NotConnected.into());
        }

        let header = self.rtp_state.next_header();
        let mut packet = Vec::with_capacity(12 + payload.len());
        packet.extend_from_slice(&header.serialize());
        packet.extend_from_slice(payload);

        trace!(
            "RTP -> seq={} ts={} marker={} ({} bytes)",
            header.sequence,
            header.timestamp,
            header.marker,
            packet.len()
        );
        self.rtp.send(&packet).await?;

        // Position only moves for packets that actually left.
        let sync_due = self.rtp_state.advance();
        self.position.send_replace(self.rtp_state.snapshot());

        if sync_due {
            self.send_sync(header.timestamp).await?;
        }

        self.pacer.pace(FRAMES_PER_PACKET).await;
        Ok(())
    }

    async fn send_sync(&mut self, timestamp: u32) -> Result<()> {
        if !self.control_connected {
            trace!("No control port from receiver, skipping sync");
            return Ok(());
        }

        let sync = SyncPacket {
            first: self.first_sync_pending,
            timestamp,
            wall: WallClock::now(),
        };
        debug!("Sync -> rtptime={} first={}", timestamp, sync.first);
        self.control.send(&sync.serialize()).await?;
        self.first_sync_pending = false;
        Ok(())
    }
}

/// Wire framing selected by the protocol version.
pub enum Framing {
    Legacy { stream: Option<TcpStream> },
    Modern(ModernLink),
}

/// Buffering, encoding and sending of audio for one engine.
pub struct AudioTransport {
    framing: Framing,
    buffer: AccumulationBuffer,
}

impl fmt::Debug for AudioTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTransport")
            .field("version", &self.version())
            .field("local_ports", &self.local_ports())
            .field("buffered", &self.buffer.fullness())
            .finish()
    }
}

impl AudioTransport {
    /// Transport carrying audio over a separate TCP connection.
    pub fn legacy() -> Self {
        Self {
            framing: Framing::Legacy { stream: None },
            buffer: AccumulationBuffer::for_version(ProtocolVersion::Legacy),
        }
    }

    /// Transport carrying audio as RTP, binding its three UDP sockets.
    pub async fn modern(bind_ip: IpAddr, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            framing: Framing::Modern(ModernLink::bind(bind_ip, config).await?),
            buffer: AccumulationBuffer::for_version(ProtocolVersion::Modern),
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        match self.framing {
            Framing::Legacy { .. } => ProtocolVersion::Legacy,
            Framing::Modern(_) => ProtocolVersion::Modern,
        }
    }

    /// Local UDP ports, for the modern transport.
    pub fn local_ports(&self) -> Option<LocalPorts> {
        match &self.framing {
            Framing::Legacy { .. } => None,
            Framing::Modern(link) => Some(link.ports),
        }
    }

    /// Shared handle to the timing socket, for the timing responder.
    pub fn timing_socket(&self) -> Option<Arc<UdpSocket>> {
        match &self.framing {
            Framing::Legacy { .. } => None,
            Framing::Modern(link) => Some(link.timing.clone()),
        }
    }

    /// Receiver of the RTP position published after each packet.
    pub fn position_receiver(&self) -> Option<watch::Receiver<RtpSnapshot>> {
        match &self.framing {
            Framing::Legacy { .. } => None,
            Framing::Modern(link) => Some(link.position.subscribe()),
        }
    }

    /// Current RTP position. Always zero for the legacy transport.
    pub fn snapshot(&self) -> RtpSnapshot {
        match &self.framing {
            Framing::Legacy { .. } => RtpSnapshot::default(),
            Framing::Modern(link) => link.rtp_state.snapshot(),
        }
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.fullness()
    }

    /// Restart the stream at RECORD: sequence and timestamp back to zero,
    /// marker armed, pacing origin cleared, nothing buffered.
    pub fn begin_record(&mut self) {
        self.buffer.clear();
        if let Framing::Modern(link) = &mut self.framing {
            link.rtp_state.reset();
            link.pacer.reset();
            link.position.send_replace(RtpSnapshot::default());
        }
    }

    /// Point the timing socket at the receiver's timing port.
    ///
    /// Once connected, the socket only accepts requests from that port.
    /// Nothing to do for the legacy transport.
    pub async fn connect_timing(&self, remote_ip: IpAddr, timing_port: u16) -> Result<()> {
        if let Framing::Modern(link) = &self.framing {
            let addr = SocketAddr::new(remote_ip, timing_port);
            debug!("Connecting timing socket to {}", addr);
            link.timing.connect(addr).await?;
        }
        Ok(())
    }

    /// Open the path audio travels on once RECORD succeeded.
    ///
    /// Legacy: a TCP connection to the receiver's `server_port`. Modern:
    /// the RTP socket is connected to `server_port`, and the control socket
    /// to `control_port` when the receiver announced one.
    pub async fn open_data_path(
        &mut self,
        remote_ip: IpAddr,
        server_port: u16,
        control_port: Option<u16>,
        connect_timeout: Duration,
    ) -> Result<()> {
        let data_addr = SocketAddr::new(remote_ip, server_port);
        match &mut self.framing {
            Framing::Legacy { stream } => {
                debug!("Connecting audio stream to {}", data_addr);
                let connected = timeout(connect_timeout, TcpStream::connect(data_addr))
                    .await
                    .map_err(|_| {
                        io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("audio connect to {} timed out", data_addr),
                        )
                    })??;
                connected.set_nodelay(true)?;
                *stream = Some(connected);
            }
            Framing::Modern(link) => {
                debug!("Connecting RTP socket to {}", data_addr);
                link.rtp.connect(data_addr).await?;
                link.data_connected = true;

                link.control_connected = match control_port {
                    Some(port) => {
                        link.control.connect(SocketAddr::new(remote_ip, port)).await?;
                        true
                    }
                    None => false,
                };
            }
        }
        Ok(())
    }

    /// Buffer PCM, sending a packet each time the buffer fills.
    ///
    /// Little-endian input is swapped to big-endian. A trailing odd byte is
    /// dropped.
    pub async fn add_audio(
        &mut self,
        cipher: &FrameCipher,
        pcm: &[u8],
        format: &PcmFormat,
    ) -> Result<()> {
        format.validate()?;
        let swap = format.sample_format.needs_swap();

        let mut remaining = pcm;
        while remaining.len() >= 2 {
            let consumed = self.buffer.fill(remaining, swap);
            remaining = &remaining[consumed..];
            if self.buffer.is_full() {
                self.flush_buffer(cipher).await?;
            }
        }
        Ok(())
    }

    /// Zero-pad and send whatever is buffered.
    pub async fn drain(&mut self, cipher: &FrameCipher) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.buffer.pad_to_capacity();
        self.flush_buffer(cipher).await
    }

    /// Discard buffered PCM without sending it.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Drop the data path. UDP sockets stay bound for the next session.
    pub fn release(&mut self) {
        self.buffer.clear();
        match &mut self.framing {
            Framing::Legacy { stream } => *stream = None,
            Framing::Modern(link) => {
                link.data_connected = false;
                link.control_connected = false;
            }
        }
    }

    /// Frame and send one encrypted payload.
    pub async fn send_frame(&mut self, encrypted: &[u8]) -> Result<()> {
        match &mut self.framing {
            Framing::Legacy { stream } => {
                let stream = stream.as_mut().ok_or(ProtocolError::NotConnected)?;
                let mut chunk = Vec::with_capacity(LEGACY_HEADER_LEN + encrypted.len());
                chunk.extend_from_slice(&legacy_frame_header(encrypted.len()));
                chunk.extend_from_slice(encrypted);

                trace!("TCP audio -> {} bytes", chunk.len());
                stream.write_all(&chunk).await?;
                Ok(())
            }
            Framing::Modern(link) => link.send(encrypted).await,
        }
    }

    async fn flush_buffer(&mut self, cipher: &FrameCipher) -> Result<()> {
        let encoded = encode_frame(self.buffer.filled());
        self.buffer.clear();
        let encrypted = cipher.encrypt_frame(&encoded);
        self.send_frame(&encrypted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::{payload_types, RtpHeader};
    use raop_core::codec::SampleFormat;
    use raop_core::error::Error;
    use std::net::Ipv4Addr;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn be_format() -> PcmFormat {
        PcmFormat::with_sample_format(SampleFormat::SignedBigEndian)
    }

    fn config(port: u16) -> EngineConfig {
        EngineConfig::default()
            .with_preferred_audio_port(port)
            .with_pacing_lead(Duration::from_secs(60))
    }

    async fn recv_timeout(socket: &UdpSocket, buf: &mut [u8]) -> Option<usize> {
        timeout(Duration::from_millis(200), socket.recv(buf))
            .await
            .ok()
            .map(|r| r.unwrap())
    }

    /// Read RTP headers off `socket` until it goes quiet.
    fn collect_headers(socket: UdpSocket) -> tokio::task::JoinHandle<Vec<RtpHeader>> {
        tokio::spawn(async move {
            let mut headers = Vec::new();
            let mut buf = [0u8; 2048];
            while let Some(len) = recv_timeout(&socket, &mut buf).await {
                headers.push(RtpHeader::parse(&buf[..len]).unwrap());
            }
            headers
        })
    }

    /// Modern transport wired to a local fake receiver.
    async fn modern_pair(port: u16, with_control: bool) -> (AudioTransport, UdpSocket, UdpSocket) {
        let mut transport = AudioTransport::modern(LOCALHOST, &config(port)).await.unwrap();
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let control = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let control_port = with_control.then(|| control.local_addr().unwrap().port());

        transport.begin_record();
        transport
            .open_data_path(
                LOCALHOST,
                server.local_addr().unwrap().port(),
                control_port,
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        (transport, server, control)
    }

    mod modern {
        use super::*;

        #[tokio::test]
        async fn binds_consecutive_ports() {
            let transport = AudioTransport::modern(LOCALHOST, &config(47400)).await.unwrap();
            let ports = transport.local_ports().unwrap();
            assert!(ports.audio >= 47400);
            assert!(ports.control > ports.audio);
            assert!(ports.timing > ports.control);
            assert_eq!(transport.version(), ProtocolVersion::Modern);
        }

        #[tokio::test]
        async fn one_full_frame_sends_one_packet() {
            let (mut transport, server, _control) = modern_pair(47500, true).await;
            let cipher = FrameCipher::with_session_key();

            transport.add_audio(&cipher, &[0u8; 1408], &be_format()).await.unwrap();

            let mut buf = [0u8; 2048];
            let len = recv_timeout(&server, &mut buf).await.unwrap();
            assert_eq!(len, 12 + 1415);
            let header = RtpHeader::parse(&buf[..len]).unwrap();
            assert_eq!(header.payload_type, payload_types::AUDIO);
            assert_eq!(header.sequence, 0);
            assert_eq!(header.timestamp, 0);
            assert!(header.marker);
            assert!(recv_timeout(&server, &mut buf).await.is_none());
        }

        #[tokio::test]
        async fn partial_frame_waits_for_drain() {
            let (mut transport, server, _control) = modern_pair(47600, true).await;
            let cipher = FrameCipher::with_session_key();

            transport.add_audio(&cipher, &[1u8; 1000], &be_format()).await.unwrap();
            assert_eq!(transport.buffered_bytes(), 1000);

            let mut buf = [0u8; 2048];
            assert!(recv_timeout(&server, &mut buf).await.is_none());

            transport.drain(&cipher).await.unwrap();
            assert_eq!(recv_timeout(&server, &mut buf).await, Some(12 + 1415));
            assert_eq!(transport.buffered_bytes(), 0);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
        async fn sync_follows_every_126th_packet() {
            let (mut transport, server, control) = modern_pair(47700, true).await;
            let collector = collect_headers(server);
            let cipher = FrameCipher::with_session_key();

            transport
                .add_audio(&cipher, &vec![0u8; 1408 * 126], &be_format())
                .await
                .unwrap();

            let headers = collector.await.unwrap();
            assert_eq!(headers.len(), 126);
            assert_eq!(headers.last().unwrap().sequence, 125);

            let mut buf = [0u8; 64];
            let len = recv_timeout(&control, &mut buf).await.unwrap();
            assert_eq!(len, 20);
            assert_eq!(&buf[..4], &[0x80, 0xd4, 0x00, 0x07]);
            assert_eq!(&buf[4..8], &(125u32 * 352).to_be_bytes());
            assert_eq!(&buf[16..20], &(126u32 * 352).to_be_bytes());
            assert!(recv_timeout(&control, &mut buf).await.is_none());
            assert_eq!(transport.snapshot().sequence, 126);
        }

        #[tokio::test]
        async fn only_first_sync_is_flagged() {
            let (mut transport, _server, control) = modern_pair(47800, true).await;
            let cipher = FrameCipher::with_session_key();

            transport
                .add_audio(&cipher, &vec![0u8; 1408 * 252], &be_format())
                .await
                .unwrap();

            let mut buf = [0u8; 64];
            recv_timeout(&control, &mut buf).await.unwrap();
            assert_eq!(buf[1], 0xd4);
            recv_timeout(&control, &mut buf).await.unwrap();
            assert_eq!(buf[1], 0x54);
        }

        #[tokio::test]
        async fn no_control_port_skips_sync() {
            let (mut transport, _server, control) = modern_pair(47900, false).await;
            let cipher = FrameCipher::with_session_key();

            transport
                .add_audio(&cipher, &vec![0u8; 1408 * 126], &be_format())
                .await
                .unwrap();

            let mut buf = [0u8; 64];
            assert!(recv_timeout(&control, &mut buf).await.is_none());
            assert_eq!(transport.snapshot().sequence, 126);
        }

        #[tokio::test]
        async fn begin_record_restarts_numbering() {
            let (mut transport, server, _control) = modern_pair(48000, true).await;
            let cipher = FrameCipher::with_session_key();
            let mut buf = [0u8; 2048];

            transport.add_audio(&cipher, &[0u8; 1408 * 2], &be_format()).await.unwrap();
            recv_timeout(&server, &mut buf).await.unwrap();
            recv_timeout(&server, &mut buf).await.unwrap();

            transport.begin_record();
            transport.add_audio(&cipher, &[0u8; 1408], &be_format()).await.unwrap();
            let len = recv_timeout(&server, &mut buf).await.unwrap();
            let header = RtpHeader::parse(&buf[..len]).unwrap();
            assert_eq!(header.sequence, 0);
            assert!(header.marker);
        }

        #[tokio::test]
        async fn position_is_published() {
            let (mut transport, _server, _control) = modern_pair(48100, true).await;
            let rx = transport.position_receiver().unwrap();
            let cipher = FrameCipher::with_session_key();

            transport.add_audio(&cipher, &[0u8; 1408 * 3], &be_format()).await.unwrap();
            assert_eq!(
                *rx.borrow(),
                RtpSnapshot {
                    sequence: 3,
                    timestamp: 1056
                }
            );
        }

        #[tokio::test]
        async fn timing_socket_targets_receiver_timing_port() {
            let transport = AudioTransport::modern(LOCALHOST, &config(48300)).await.unwrap();
            let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let receiver_addr = receiver.local_addr().unwrap();

            transport.connect_timing(LOCALHOST, receiver_addr.port()).await.unwrap();

            let timing = transport.timing_socket().unwrap();
            assert_eq!(timing.peer_addr().unwrap(), receiver_addr);
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn failed_send_leaves_position_unchanged() {
            let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
            let closed_port = closed.local_addr().unwrap().port();
            drop(closed);

            let mut transport = AudioTransport::modern(LOCALHOST, &config(48400)).await.unwrap();
            transport.begin_record();
            transport
                .open_data_path(LOCALHOST, closed_port, None, Duration::from_secs(1))
                .await
                .unwrap();

            // The port-unreachable reply surfaces on a later send.
            let mut sent = 0u16;
            let mut failed = false;
            for _ in 0..20 {
                match transport.send_frame(&[0u8; 16]).await {
                    Ok(()) => sent += 1,
                    Err(Error::Connection(_)) => {
                        failed = true;
                        break;
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }

            assert!(failed);
            let snapshot = transport.snapshot();
            assert_eq!(snapshot.sequence, sent);
            assert_eq!(snapshot.timestamp, u32::from(sent) * FRAMES_PER_PACKET);
        }

        #[tokio::test]
        async fn send_before_record_is_not_connected() {
            let mut transport = AudioTransport::modern(LOCALHOST, &config(48200)).await.unwrap();
            let result = transport.send_frame(&[0u8; 16]).await;
            assert!(matches!(
                result,
                Err(Error::Protocol(ProtocolError::NotConnected))
            ));
        }
    }

    mod legacy {
        use super::*;

        #[tokio::test]
        async fn full_chunk_is_framed_on_tcp() {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let server = tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut chunk = vec![0u8; 16 + 16391];
                socket.read_exact(&mut chunk).await.unwrap();
                chunk
            });

            let mut transport = AudioTransport::legacy();
            transport
                .open_data_path(LOCALHOST, port, None, Duration::from_secs(1))
                .await
                .unwrap();
            let cipher = FrameCipher::with_session_key();
            transport.add_audio(&cipher, &vec![0u8; 16384], &be_format()).await.unwrap();

            let chunk = server.await.unwrap();
            assert_eq!(hex::encode(&chunk[..16]), "24004013f0ff00000000000000000000");
        }

        #[tokio::test]
        async fn send_without_stream_is_not_connected() {
            let mut transport = AudioTransport::legacy();
            let result = transport.send_frame(&[0u8; 16]).await;
            assert!(matches!(
                result,
                Err(Error::Protocol(ProtocolError::NotConnected))
            ));
            assert!(transport.local_ports().is_none());
            assert!(transport.connect_timing(LOCALHOST, 6002).await.is_ok());
        }

        #[tokio::test]
        async fn release_drops_buffer() {
            let mut transport = AudioTransport::legacy();
            let cipher = FrameCipher::with_session_key();
            transport.add_audio(&cipher, &[0u8; 100], &be_format()).await.unwrap();
            transport.release();
            assert_eq!(transport.buffered_bytes(), 0);
        }
    }

    mod input {
        use super::*;

        #[tokio::test]
        async fn rejects_unsupported_format() {
            let mut transport = AudioTransport::legacy();
            let cipher = FrameCipher::with_session_key();
            let format = PcmFormat {
                sample_rate: 48000,
                ..be_format()
            };
            let result = transport.add_audio(&cipher, &[0u8; 4], &format).await;
            assert!(matches!(result, Err(Error::InvalidMediaFormat(_))));
        }

        #[tokio::test]
        async fn odd_byte_is_dropped() {
            let mut transport = AudioTransport::legacy();
            let cipher = FrameCipher::with_session_key();
            transport.add_audio(&cipher, &[0u8; 7], &be_format()).await.unwrap();
            assert_eq!(transport.buffered_bytes(), 6);
        }
    }
}
