//! Error types for the RAOP output engine.

use thiserror::Error;

/// Primary error type for all RAOP operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No such device: failed to resolve {host}")]
    AddressResolution { host: String },

    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Protocol failure: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("No free UDP port in {first_port}..+{attempts}")]
    PortExhaustion { first_port: u16, attempts: u32 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid media format: {0}")]
    InvalidMediaFormat(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Errors raised by the RTSP-like control exchange.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unexpected status code: {code} {reason}")]
    UnexpectedStatus { code: u16, reason: String },

    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("Transport header lacks {0}")]
    MissingTransportField(&'static str),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Control connection not established")]
    NotConnected,
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
