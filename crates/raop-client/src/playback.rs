//! Feeding a byte stream of PCM into an [`AudioSink`].

use raop_core::error::Result;
use raop_core::PcmFormat;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::traits::AudioSink;

/// Bytes read from the source per push.
pub const CHUNK_BYTES: usize = 4096;

/// Copy `reader` into `sink` until EOF, then drain.
///
/// Reads may end mid-sample; the odd byte is carried into the next push so
/// no sample is split. Returns the number of bytes pushed.
pub async fn stream_pcm<S, R>(sink: &mut S, mut reader: R, format: &PcmFormat) -> Result<u64>
where
    S: AudioSink + ?Sized,
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_BYTES];
    let mut carry = 0usize;
    let mut pushed = 0u64;

    loop {
        let n = reader.read(&mut buf[carry..]).await?;
        if n == 0 {
            break;
        }

        let available = carry + n;
        let whole = available & !1;
        sink.push_audio(&buf[..whole], format).await?;
        pushed += whole as u64;

        carry = available - whole;
        if carry > 0 {
            buf[0] = buf[whole];
        }
    }

    if carry > 0 {
        debug!("Dropping trailing odd byte at end of input");
    }
    sink.drain().await?;
    Ok(pushed)
}
