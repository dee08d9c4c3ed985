//! # raop-timing
//!
//! Timing support for the RAOP UDP transport: wall-clock stamps for timing
//! and sync packets, and the background responder answering the receiver's
//! timing requests.

pub mod clock;
pub mod responder;

pub use clock::WallClock;
pub use responder::{build_timing_response, TimingResponder};
