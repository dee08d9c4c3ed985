//! RTSP request formatting.

/// Methods used by a RAOP sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtspMethod {
    Options,
    Announce,
    Setup,
    Record,
    Flush,
    Teardown,
    GetParameter,
    SetParameter,
}

impl RtspMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Announce => "ANNOUNCE",
            Self::Setup => "SETUP",
            Self::Record => "RECORD",
            Self::Flush => "FLUSH",
            Self::Teardown => "TEARDOWN",
            Self::GetParameter => "GET_PARAMETER",
            Self::SetParameter => "SET_PARAMETER",
        }
    }
}

/// Headers every request carries, stamped in by the control session.
#[derive(Debug, Clone, Copy)]
pub struct RequestEnvelope<'a> {
    pub cseq: u32,
    /// Server session id, once SETUP assigned one.
    pub session: Option<&'a str>,
    pub user_agent: &'a str,
    /// Sent both as `Client-Instance` and `DACP-ID`.
    pub instance_id: &'a str,
}

/// RTSP request builder.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: RtspMethod,
    pub uri: String,
    /// Request-specific headers, emitted in insertion order.
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl RtspRequest {
    pub fn new(method: RtspMethod, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Vec::new(),
            content_type: None,
            body: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Value of a request-specific header (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Serialize to wire format.
    ///
    /// Format:
    /// ```text
    /// METHOD URI RTSP/1.0\r\n
    /// <request headers>\r\n
    /// CSeq: N\r\n
    /// Session: ID\r\n            (once assigned)
    /// User-Agent: UA\r\n
    /// Client-Instance: ID\r\n
    /// DACP-ID: ID\r\n
    /// Content-Type: T\r\n        (with a body)
    /// Content-Length: M\r\n      (with a body)
    /// \r\n
    /// [body]
    /// ```
    pub fn serialize(&self, envelope: &RequestEnvelope<'_>) -> Vec<u8> {
        let mut head = format!("{} {} RTSP/1.0\r\n", self.method.as_str(), self.uri);

        for (key, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }

        head.push_str(&format!("CSeq: {}\r\n", envelope.cseq));
        if let Some(session) = envelope.session.filter(|s| !s.is_empty()) {
            head.push_str(&format!("Session: {}\r\n", session));
        }
        head.push_str(&format!("User-Agent: {}\r\n", envelope.user_agent));
        head.push_str(&format!("Client-Instance: {}\r\n", envelope.instance_id));
        head.push_str(&format!("DACP-ID: {}\r\n", envelope.instance_id));

        match &self.body {
            Some(body) => {
                if let Some(content_type) = &self.content_type {
                    head.push_str(&format!("Content-Type: {}\r\n", content_type));
                }
                head.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
                let mut out = head.into_bytes();
                out.extend_from_slice(body);
                out
            }
            None => {
                head.push_str("\r\n");
                head.into_bytes()
            }
        }
    }

    // Factory methods for the RAOP handshake

    pub fn options_with_challenge(challenge: &str) -> Self {
        Self::new(RtspMethod::Options, "*").header("Apple-Challenge", challenge)
    }

    pub fn announce(uri: impl Into<String>, sdp: impl Into<Vec<u8>>) -> Self {
        Self::new(RtspMethod::Announce, uri).body("application/sdp", sdp)
    }

    /// SETUP with a `Transport` header describing the local framing.
    pub fn setup_raop(uri: impl Into<String>, transport_header: &str) -> Self {
        Self::new(RtspMethod::Setup, uri).header("Transport", transport_header)
    }

    pub fn record_with_info(uri: impl Into<String>, seq: u16, rtptime: u32) -> Self {
        Self::new(RtspMethod::Record, uri)
            .header("Range", "npt=0-")
            .header("RTP-Info", format!("seq={};rtptime={}", seq, rtptime))
    }

    pub fn flush_with_info(uri: impl Into<String>, seq: u16, rtptime: u32) -> Self {
        Self::new(RtspMethod::Flush, uri)
            .header("RTP-Info", format!("seq={};rtptime={}", seq, rtptime))
    }

    pub fn teardown(uri: impl Into<String>) -> Self {
        Self::new(RtspMethod::Teardown, uri)
    }

    pub fn get_parameter_text(uri: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(RtspMethod::GetParameter, uri).body("text/parameters", body)
    }

    pub fn set_parameter_text(uri: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(RtspMethod::SetParameter, uri).body("text/parameters", body)
    }
}
