//! RTSP response parsing.

use raop_core::error::{ProtocolError, Result};
use std::collections::HashMap;

/// Parsed RTSP response.
#[derive(Debug, Clone)]
pub struct RtspResponse {
    pub status_code: u16,
    pub status_text: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl RtspResponse {
    /// Parse response from wire format.
    ///
    /// Format:
    /// ```text
    /// RTSP/1.0 200 OK\r\n
    /// CSeq: N\r\n
    /// Content-Length: M\r\n
    /// Header: Value\r\n
    /// ...
    /// \r\n
    /// [body]
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header_end = data
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .ok_or_else(|| ProtocolError::InvalidResponse("missing header terminator".to_string()))?;

        let mut response = Self::parse_head(&data[..header_end])?;
        let body_start = header_end + 4;
        let content_length = response.content_length().unwrap_or(0);

        if content_length > 0 {
            if data.len() < body_start + content_length {
                return Err(ProtocolError::InvalidResponse(format!(
                    "body too short: expected {} bytes, got {}",
                    content_length,
                    data.len() - body_start
                ))
                .into());
            }
            response.body = Some(data[body_start..body_start + content_length].to_vec());
        }

        Ok(response)
    }

    /// Parse the status line and headers (everything before the blank line).
    pub fn parse_head(head: &[u8]) -> Result<Self> {
        let head = std::str::from_utf8(head)
            .map_err(|_| ProtocolError::InvalidResponse("invalid UTF-8 in headers".to_string()))?;

        let mut lines = head.lines();
        let status_line = lines
            .next()
            .ok_or_else(|| ProtocolError::InvalidResponse("missing status line".to_string()))?;
        let (status_code, status_text) = parse_status_line(status_line)?;

        let mut headers = HashMap::new();
        for line in lines {
            if let Some((key, value)) = line.split_once(':') {
                headers.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Ok(Self {
            status_code,
            status_text,
            headers,
            body: None,
        })
    }

    /// Get header value (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cseq(&self) -> Option<u32> {
        self.header("CSeq").and_then(|v| v.parse().ok())
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    /// Body decoded as UTF-8 (lossy), empty when there is none.
    pub fn body_text(&self) -> String {
        self.body
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// RAOP receivers answer every accepted request with 200.
    pub fn ensure_ok(&self) -> Result<()> {
        if self.status_code == 200 {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedStatus {
                code: self.status_code,
                reason: self.status_text.clone(),
            }
            .into())
        }
    }
}

/// Parse status line: "RTSP/1.0 200 OK"
fn parse_status_line(line: &str) -> Result<(u16, String)> {
    let parts: Vec<&str> = line.splitn(3, ' ').collect();

    if parts.len() < 2 {
        return Err(
            ProtocolError::InvalidResponse(format!("malformed status line: {}", line)).into(),
        );
    }

    if !parts[0].starts_with("RTSP/") {
        return Err(
            ProtocolError::InvalidResponse(format!("not an RTSP response: {}", parts[0])).into(),
        );
    }

    let code = parts[1].parse().map_err(|_| {
        ProtocolError::InvalidResponse(format!("invalid status code: {}", parts[1]))
    })?;

    let text = parts.get(2).unwrap_or(&"").to_string();

    Ok((code, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raop_core::Error;

    mod parsing {
        use super::*;

        #[test]
        fn parse_simple_response() {
            let response = RtspResponse::parse(b"RTSP/1.0 200 OK\r\n\r\n").unwrap();
            assert_eq!(response.status_code, 200);
            assert_eq!(response.status_text, "OK");
            assert!(response.body.is_none());
        }

        #[test]
        fn parse_setup_response_headers() {
            let data = b"RTSP/1.0 200 OK\r\nCSeq: 3\r\nSession: DEADBEEF\r\n\
                Transport: RTP/AVP/UDP;unicast;mode=record;server_port=6000;control_port=6001;timing_port=6002\r\n\r\n";
            let response = RtspResponse::parse(data).unwrap();
            assert_eq!(response.cseq(), Some(3));
            assert_eq!(response.header("session"), Some("DEADBEEF"));
            assert!(response.header("Transport").unwrap().contains("server_port=6000"));
        }

        #[test]
        fn parse_response_with_body() {
            let data = b"RTSP/1.0 200 OK\r\nContent-Length: 13\r\n\r\nvolume: -30.0";
            let response = RtspResponse::parse(data).unwrap();
            assert_eq!(response.body_text(), "volume: -30.0");
        }

        #[test]
        fn parse_error_on_malformed_status_line() {
            assert!(RtspResponse::parse(b"INVALID\r\n\r\n").is_err());
            assert!(RtspResponse::parse(b"HTTP/1.1 200 OK\r\n\r\n").is_err());
        }

        #[test]
        fn parse_error_on_truncated_body() {
            let data = b"RTSP/1.0 200 OK\r\nContent-Length: 100\r\n\r\nshort";
            assert!(RtspResponse::parse(data).is_err());
        }

        #[test]
        fn parse_handles_no_status_text() {
            let response = RtspResponse::parse(b"RTSP/1.0 200\r\n\r\n").unwrap();
            assert_eq!(response.status_code, 200);
            assert_eq!(response.status_text, "");
        }

        #[test]
        fn parse_missing_header_terminator() {
            assert!(RtspResponse::parse(b"RTSP/1.0 200 OK\r\nCSeq: 1").is_err());
        }
    }

    mod status_checking {
        use super::*;

        fn make_response(status_code: u16, status_text: &str) -> RtspResponse {
            RtspResponse {
                status_code,
                status_text: status_text.to_string(),
                headers: HashMap::new(),
                body: None,
            }
        }

        #[test]
        fn ok_only_for_200() {
            assert!(make_response(200, "OK").ensure_ok().is_ok());
            assert!(make_response(204, "No Content").ensure_ok().is_err());
        }

        #[test]
        fn error_carries_code_and_reason() {
            let err = make_response(453, "Not Enough Bandwidth").ensure_ok().unwrap_err();
            match err {
                Error::Protocol(ProtocolError::UnexpectedStatus { code, reason }) => {
                    assert_eq!(code, 453);
                    assert_eq!(reason, "Not Enough Bandwidth");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[test]
        fn body_text_empty_without_body() {
            assert_eq!(make_response(200, "OK").body_text(), "");
        }
    }
}
