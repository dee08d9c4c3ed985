//! Fixed key material used on the wire.
//!
//! RAOP receivers accept a session key wrapped with their public RSA key.
//! The wrapped blob is precomputed and always sent alongside the zero key,
//! so no RSA work happens at runtime.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;

/// AES-128 session key (all zero).
pub const SESSION_KEY: [u8; 16] = [0u8; 16];

/// AES IV advertised in the SDP. Frames are always chained from zero.
pub const SESSION_IV: [u8; 16] = [0u8; 16];

/// Wrapped session key, base64 without padding, as carried in `a=rsaaeskey:`.
pub const RSA_WRAPPED_SESSION_KEY: &str = "ruhL6ogbzAZwHFR/53gmXCPGslyJxhUOaJCUeISYt93/h7CsNLP0jeMtpMH8P6xktJXvlh8uws8GqjnBo2uskF01okfgUsfTXuqhTmeLH+E8spoxeuon80TWZoUviHRkdYjLBH30s9G8ZcbmblvPQBRB5gU1Qs6Wc3rXCKnsBu5KN9bIWE4hFEmgGSAIpjlMQOwfVP1TmJhcAFw8kkrZDpDa6iOOWsaIiEJpuD75I/lw+hyIGlZwKfgztkck+YKzdE+tANWCvwG/XNOALDwsVD0zTnAcx1qAicFC5eQAzkBC8M8TdAFshdHdwkMk7pYnWX4eown4YEg1sZFqtTp4Kg";

/// Bytes sent in the OPTIONS `Apple-Challenge` header.
pub const APPLE_CHALLENGE: [u8; 16] = [0u8; 16];

/// Base64 (no padding) of the SDP IV.
pub fn session_iv_b64() -> String {
    STANDARD_NO_PAD.encode(SESSION_IV)
}

/// Base64 (no padding) of the OPTIONS challenge.
pub fn apple_challenge_b64() -> String {
    STANDARD_NO_PAD.encode(APPLE_CHALLENGE)
}
