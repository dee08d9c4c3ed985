//! # raop-crypto
//!
//! Cryptographic pieces of the RAOP sender:
//! - AES-128 per-frame CBC encryption of encoded audio
//! - Fixed session key material advertised in the SDP
//! - SHA-256 identity digests for the control session
//!
//! Key material is zeroized on drop.

pub mod aes;
pub mod digest;
pub mod keys;

pub use self::aes::FrameCipher;
pub use digest::instance_id;
