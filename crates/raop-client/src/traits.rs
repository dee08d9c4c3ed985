//! Capability traits exposed by an output engine.
//!
//! A host pipeline drives the engine through these rather than the
//! concrete type, which keeps it mockable.

use async_trait::async_trait;
use raop_core::error::Result;
use raop_core::PcmFormat;

/// Consumer of raw PCM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSink: Send {
    /// Queue PCM for sending; full packets go out as they fill.
    async fn push_audio(&mut self, pcm: &[u8], format: &PcmFormat) -> Result<()>;

    /// Send whatever is still buffered, zero-padded.
    async fn drain(&mut self) -> Result<()>;
}

/// Host lifecycle signals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Lifecycle: Send {
    async fn activate(&mut self) -> Result<()>;
    async fn start(&mut self) -> Result<()>;
    async fn pause(&mut self) -> Result<()>;
    async fn resume(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
    async fn deactivate(&mut self) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VolumeControl: Send {
    /// Store `volume` and forward it to the receiver.
    async fn set_volume(&mut self, volume: f32) -> Result<()>;

    /// Last value passed to `set_volume`.
    fn volume(&self) -> f32;
}
