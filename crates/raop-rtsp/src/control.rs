//! RAOP control session: the request/response steps of the handshake.
//!
//! Each step sends exactly one request and fails on anything but `200`.
//! Nothing is retried; callers decide whether to reconnect.

use std::time::SystemTime;

use raop_core::error::{ProtocolError, Result};
use raop_core::ProtocolVersion;
use raop_crypto::keys::apple_challenge_b64;
use tracing::{debug, info};

use crate::raop_session::{parse_transport_header, RaopSession, ServerPorts, TransportRequest};
use crate::sdp::SdpBuilder;
use crate::traits::RtspTransport;
use crate::{RtspRequest, RtspResponse};

/// Control channel plus the session bookkeeping it drives.
pub struct ControlSession<T: RtspTransport> {
    session: RaopSession,
    transport: Option<T>,
}

impl<T: RtspTransport> ControlSession<T> {
    pub fn new(version: ProtocolVersion, user_agent: impl Into<String>) -> Self {
        Self {
            session: RaopSession::new(version, user_agent),
            transport: None,
        }
    }

    /// Adopt a freshly connected transport.
    pub fn attach(&mut self, transport: T) -> Result<()> {
        let local = transport.local_addr().ok_or(ProtocolError::NotConnected)?;
        let remote = transport.peer_addr().ok_or(ProtocolError::NotConnected)?;
        self.session.attach(local, remote, SystemTime::now());
        self.transport = Some(transport);
        debug!(
            "Control session attached: {} -> {} (instance {})",
            local,
            remote,
            self.session.instance_id().unwrap_or_default()
        );
        Ok(())
    }

    /// Drop the control connection without any protocol exchange.
    pub fn reset(&mut self) {
        self.transport = None;
        self.session.detach();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn session(&self) -> &RaopSession {
        &self.session
    }

    /// Stamp the standard headers onto `request`, send it and require `200`.
    pub async fn send_request(&mut self, request: RtspRequest) -> Result<RtspResponse> {
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotConnected)?;

        let cseq = self.session.next_cseq();
        let wire = request.serialize(&self.session.envelope(cseq));
        debug!(
            "RTSP -> {} {} (cseq={}, body_len={})",
            request.method.as_str(),
            request.uri,
            cseq,
            request.body.as_ref().map(|b| b.len()).unwrap_or(0)
        );

        let response = transport.send(wire).await?;
        response.ensure_ok()?;
        Ok(response)
    }

    /// OPTIONS with an `Apple-Challenge`. An `Apple-Response` header means
    /// the receiver wants authenticated, encrypted audio.
    pub async fn options(&mut self) -> Result<()> {
        let request = RtspRequest::options_with_challenge(&apple_challenge_b64());
        let response = self.send_request(request).await?;

        let encryption_required = response.header("Apple-Response").is_some();
        self.session.set_options_received(encryption_required);
        debug!("OPTIONS ok (encryption required: {})", encryption_required);
        Ok(())
    }

    /// ANNOUNCE the stream format and key material.
    pub async fn announce(&mut self) -> Result<()> {
        self.session.clear_server_session_id();

        let local_ip = self.session.local_ip().ok_or(ProtocolError::NotConnected)?;
        let remote_ip = self.session.remote_ip().ok_or(ProtocolError::NotConnected)?;
        let sdp = SdpBuilder::new(
            self.session.client_session_id(),
            local_ip,
            remote_ip,
            self.session.version().frames_per_packet(),
        )
        .build();

        let request = RtspRequest::announce(self.session.record_url(), sdp);
        self.send_request(request).await?;
        self.session.set_announced()
    }

    /// SETUP the audio transport and learn the receiver's ports.
    pub async fn setup(&mut self, transport: TransportRequest) -> Result<ServerPorts> {
        let request = RtspRequest::setup_raop(self.session.record_url(), &transport.header_value());
        let response = self.send_request(request).await?;

        let session_id = response
            .header("Session")
            .ok_or(ProtocolError::MissingHeader("Session"))?
            .to_string();
        let transport_header = response
            .header("Transport")
            .ok_or(ProtocolError::MissingHeader("Transport"))?;
        let ports = parse_transport_header(transport_header)?;

        info!(
            "SETUP ok: session={}, server_port={}, control_port={:?}, timing_port={:?}",
            session_id, ports.server_port, ports.control_port, ports.timing_port
        );
        self.session.set_setup_complete(&session_id, ports)?;
        Ok(ports)
    }

    /// RECORD from sequence 0 / RTP time 0. Returns the advertised latency.
    pub async fn record(&mut self) -> Result<Option<u32>> {
        let request = RtspRequest::record_with_info(self.session.record_url(), 0, 0);
        let response = self.send_request(request).await?;

        let latency = response
            .header("Audio-Latency")
            .and_then(|v| v.trim().parse::<u32>().ok());
        debug!("RECORD ok (audio latency: {:?})", latency);
        self.session.set_recording(latency)?;
        Ok(latency)
    }

    /// FLUSH with the current RTP position.
    pub async fn flush(&mut self, seq: u16, rtptime: u32) -> Result<()> {
        let request = RtspRequest::flush_with_info(self.session.record_url(), seq, rtptime);
        self.send_request(request).await?;
        Ok(())
    }

    /// TEARDOWN, then drop the connection. On failure the connection is
    /// left in place so the caller can decide what to release.
    pub async fn teardown(&mut self) -> Result<()> {
        let request = RtspRequest::teardown(self.session.record_url());
        self.send_request(request).await?;
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Control close after TEARDOWN: {}", e);
            }
        }
        self.reset();
        Ok(())
    }

    /// GET_PARAMETER; returns the body text.
    pub async fn get_parameter(&mut self, text: &str) -> Result<String> {
        let request = RtspRequest::get_parameter_text(self.session.record_url(), text);
        let response = self.send_request(request).await?;
        let parameters = response.body_text();
        debug!("parameters: {}", parameters.trim_end());
        Ok(parameters)
    }

    pub async fn set_parameter(&mut self, text: &str) -> Result<()> {
        let request = RtspRequest::set_parameter_text(self.session.record_url(), text);
        self.send_request(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raop_session::RaopSessionState;
    use crate::traits::MockRtspTransport;
    use raop_core::Error;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn ok(headers: &[(&str, &str)]) -> RtspResponse {
        RtspResponse {
            status_code: 200,
            status_text: "OK".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: None,
        }
    }

    /// Mock that records every request and answers via `reply`.
    fn scripted_transport(
        sent: Arc<Mutex<Vec<String>>>,
        reply: impl Fn(&str) -> Result<RtspResponse> + Send + Sync + 'static,
    ) -> MockRtspTransport {
        let mut mock = MockRtspTransport::new();
        mock.expect_local_addr()
            .returning(|| Some("192.168.1.10:50000".parse().unwrap()));
        mock.expect_peer_addr()
            .returning(|| Some("192.168.1.20:5000".parse().unwrap()));
        mock.expect_close().returning(|| Ok(()));
        mock.expect_send().returning(move |wire| {
            let text = String::from_utf8(wire).unwrap();
            let result = reply(&text);
            sent.lock().unwrap().push(text);
            result
        });
        mock
    }

    fn happy_receiver(request: &str) -> Result<RtspResponse> {
        if request.starts_with("OPTIONS") {
            Ok(ok(&[("Apple-Response", "xyz")]))
        } else if request.starts_with("SETUP") {
            Ok(ok(&[
                ("Session", "DEADBEEF"),
                (
                    "Transport",
                    "RTP/AVP/UDP;unicast;mode=record;server_port=6000;control_port=6001;timing_port=6002",
                ),
            ]))
        } else if request.starts_with("RECORD") {
            Ok(ok(&[("Audio-Latency", "11025")]))
        } else {
            Ok(ok(&[]))
        }
    }

    fn attached(
        reply: impl Fn(&str) -> Result<RtspResponse> + Send + Sync + 'static,
    ) -> (ControlSession<MockRtspTransport>, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut control = ControlSession::new(ProtocolVersion::Modern, "BlueTune/1.0");
        control
            .attach(scripted_transport(sent.clone(), reply))
            .unwrap();
        (control, sent)
    }

    mod handshake {
        use super::*;

        #[tokio::test]
        async fn full_sequence_succeeds() {
            let (mut control, sent) = attached(happy_receiver);

            control.options().await.unwrap();
            control.announce().await.unwrap();
            let ports = control
                .setup(TransportRequest::Udp {
                    control_port: 6001,
                    timing_port: 6002,
                })
                .await
                .unwrap();
            let latency = control.record().await.unwrap();

            assert_eq!(ports.server_port, 6000);
            assert_eq!(latency, Some(11025));
            assert_eq!(control.session().state(), RaopSessionState::Recording);
            assert!(control.session().encryption_required());

            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 4);
            assert!(sent[0].contains("CSeq: 1\r\n"));
            assert!(sent[3].contains("CSeq: 4\r\n"));
            assert!(!sent[2].contains("Session:"));
            assert!(sent[3].contains("Session: DEADBEEF\r\n"));
            assert!(sent[3].contains("Range: npt=0-\r\nRTP-Info: seq=0;rtptime=0\r\n"));
        }

        #[tokio::test]
        async fn announce_carries_sdp() {
            let (mut control, sent) = attached(happy_receiver);
            control.announce().await.unwrap();

            let sent = sent.lock().unwrap();
            let url = control.session().record_url();
            assert!(sent[0].starts_with(&format!("ANNOUNCE {} RTSP/1.0\r\n", url)));
            assert!(sent[0].contains("Content-Type: application/sdp\r\n"));
            assert!(sent[0].contains("a=fmtp:96 352 0 16 40 10 14 2 255 0 0 44100\r\n"));
        }

        #[tokio::test]
        async fn setup_without_session_header_fails() {
            let (mut control, _sent) = attached(|request| {
                if request.starts_with("SETUP") {
                    Ok(ok(&[("Transport", "RTP/AVP/UDP;server_port=6000")]))
                } else {
                    Ok(ok(&[]))
                }
            });
            control.announce().await.unwrap();
            let result = control.setup(TransportRequest::Tcp).await;
            assert!(matches!(
                result,
                Err(Error::Protocol(ProtocolError::MissingHeader("Session")))
            ));
            assert_eq!(control.session().server_session_id(), "");
        }

        #[tokio::test]
        async fn setup_without_server_port_fails() {
            let (mut control, _sent) = attached(|request| {
                if request.starts_with("SETUP") {
                    Ok(ok(&[("Session", "1"), ("Transport", "RTP/AVP/TCP;unicast")]))
                } else {
                    Ok(ok(&[]))
                }
            });
            control.announce().await.unwrap();
            let result = control.setup(TransportRequest::Tcp).await;
            assert!(matches!(
                result,
                Err(Error::Protocol(ProtocolError::MissingTransportField(_)))
            ));
        }

        #[tokio::test]
        async fn non_200_is_protocol_failure() {
            let (mut control, _sent) = attached(|_| {
                Ok(RtspResponse {
                    status_code: 401,
                    status_text: "Unauthorized".to_string(),
                    headers: HashMap::new(),
                    body: None,
                })
            });
            let result = control.options().await;
            assert!(matches!(
                result,
                Err(Error::Protocol(ProtocolError::UnexpectedStatus { code: 401, .. }))
            ));
            assert!(!control.session().options_received());
        }

        #[tokio::test]
        async fn options_without_apple_response() {
            let (mut control, _sent) = attached(|_| Ok(ok(&[])));
            control.options().await.unwrap();
            assert!(control.session().options_received());
            assert!(!control.session().encryption_required());
        }
    }

    mod teardown_and_parameters {
        use super::*;

        #[tokio::test]
        async fn teardown_resets_connection() {
            let (mut control, sent) = attached(happy_receiver);
            control.flush(12, 4224).await.unwrap();
            control.teardown().await.unwrap();

            assert!(!control.is_connected());
            assert_eq!(control.session().state(), RaopSessionState::Disconnected);
            let sent = sent.lock().unwrap();
            assert!(sent[0].starts_with("FLUSH "));
            assert!(sent[0].contains("RTP-Info: seq=12;rtptime=4224\r\n"));
            assert!(sent[1].starts_with("TEARDOWN "));
        }

        #[tokio::test]
        async fn requests_fail_when_not_connected() {
            let mut control: ControlSession<MockRtspTransport> =
                ControlSession::new(ProtocolVersion::Legacy, "BlueTune/1.0");
            assert!(matches!(
                control.set_parameter("volume: 0.000000\r\n").await,
                Err(Error::Protocol(ProtocolError::NotConnected))
            ));
        }

        #[tokio::test]
        async fn set_parameter_body() {
            let (mut control, sent) = attached(|_| Ok(ok(&[])));
            control.set_parameter("volume: -15.000000\r\n").await.unwrap();
            let sent = sent.lock().unwrap();
            assert!(sent[0].starts_with("SET_PARAMETER "));
            assert!(sent[0].ends_with(
                "Content-Type: text/parameters\r\nContent-Length: 20\r\n\r\nvolume: -15.000000\r\n"
            ));
        }

        #[tokio::test]
        async fn get_parameter_returns_body() {
            let (mut control, _sent) = attached(|_| {
                let mut response = ok(&[]);
                response.body = Some(b"volume: -20.000000\r\n".to_vec());
                Ok(response)
            });
            let body = control.get_parameter("volume\r\n").await.unwrap();
            assert_eq!(body, "volume: -20.000000\r\n");
        }
    }
}
