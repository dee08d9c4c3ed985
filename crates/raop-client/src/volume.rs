//! Volume to receiver attenuation mapping.

/// Attenuation sent for silence.
pub const MUTE_DB: f32 = -144.0;

/// Map a 0..1 volume to the receiver's dB scale.
///
/// Anything at or below zero (and NaN) mutes; anything at or above one is
/// full scale; in between the mapping is linear down to -30 dB.
pub fn volume_to_db(volume: f32) -> f32 {
    if volume.is_nan() || volume <= 0.0 {
        MUTE_DB
    } else if volume >= 1.0 {
        0.0
    } else {
        -30.0 * volume
    }
}

/// `text/parameters` body carrying the volume.
pub fn volume_parameter(volume: f32) -> String {
    format!("volume: {:.6}\r\n", volume_to_db(volume))
}
