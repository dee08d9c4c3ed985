//! Identity digests for the control session.

use sha2::{Digest, Sha256};

/// Derive a 16-character upper-case hex identifier from arbitrary seed
/// material (connect timestamp and socket endpoints).
///
/// Used for the `Client-Instance` and `DACP-ID` headers.
pub fn instance_id(seed: &[u8]) -> String {
    let digest = Sha256::digest(seed);
    hex::encode_upper(&digest[..8])
}
