//! # raop-client
//!
//! RAOP output engine.
//!
//! This crate provides:
//! - `RaopOutput`, driving one receiver through its lifecycle
//! - Capability traits a host pipeline can drive it through
//! - Volume mapping and a helper for streaming PCM from a reader
//!
//! ## Example
//!
//! ```ignore
//! use raop_client::RaopOutput;
//! use raop_core::{EngineConfig, PcmFormat};
//!
//! let mut output = RaopOutput::open("raop://192.168.1.20:5000", EngineConfig::default())?;
//! output.start().await?;
//! output.set_volume(0.5).await?;
//! output.push_audio(&pcm, &PcmFormat::default()).await?;
//! output.drain().await?;
//! output.stop().await?;
//! ```

mod engine;
mod playback;
mod state;
mod traits;
mod volume;

pub use engine::RaopOutput;
pub use playback::{stream_pcm, CHUNK_BYTES};
pub use state::EngineState;
pub use traits::{AudioSink, Lifecycle, VolumeControl};
pub use volume::{volume_parameter, volume_to_db, MUTE_DB};

pub use raop_core::{EngineConfig, Error, PcmFormat, ProtocolVersion, RaopTarget, Result, SampleFormat};
