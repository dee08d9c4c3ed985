//! # raop-core
//!
//! Core types and error definitions shared across the RAOP crates.
//!
//! This crate provides:
//! - Receiver addressing (`raop://` / `raopt://`)
//! - PCM format definitions and validation
//! - Protocol version and engine configuration
//! - Common error types

pub mod codec;
pub mod error;
pub mod stream;
pub mod target;

pub use codec::{PcmFormat, SampleFormat};
pub use error::{Error, ProtocolError, Result};
pub use stream::{EngineConfig, ProtocolVersion, RtpSnapshot};
pub use target::RaopTarget;
