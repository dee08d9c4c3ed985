//! # raop-rtsp
//!
//! RTSP-like control protocol for RAOP receivers.
//!
//! Covers request serialization with the standard RAOP headers, response
//! parsing, the TCP control connection, the ANNOUNCE SDP body and the
//! OPTIONS → ANNOUNCE → SETUP → RECORD negotiation steps.

pub mod connection;
pub mod control;
pub mod raop_session;
pub mod request;
pub mod response;
pub mod sdp;
pub mod traits;

pub use connection::{connect_tcp, resolve, RtspConnection};
pub use control::ControlSession;
pub use raop_session::{parse_transport_header, RaopSession, RaopSessionState, ServerPorts, TransportRequest};
pub use request::{RequestEnvelope, RtspMethod, RtspRequest};
pub use response::RtspResponse;
pub use sdp::SdpBuilder;
pub use traits::RtspTransport;
