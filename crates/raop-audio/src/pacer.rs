//! Real-time pacing of the RTP send path.
//!
//! Receivers expect audio at playback rate. The pacer tracks how much audio
//! has been sent since RECORD and sleeps whenever the sender gets more than
//! the configured lead ahead of the wall clock.

use std::time::Duration;

use raop_core::codec::SAMPLE_RATE;
use tokio::time::{sleep, Instant};
use tracing::trace;

#[derive(Debug)]
pub struct Pacer {
    origin: Option<Instant>,
    frames_sent: u64,
    lead: Duration,
}

impl Pacer {
    pub fn new(lead: Duration) -> Self {
        Self {
            origin: None,
            frames_sent: 0,
            lead,
        }
    }

    /// Start counting from scratch at the next packet.
    pub fn reset(&mut self) {
        self.origin = None;
        self.frames_sent = 0;
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Duration of audio sent so far.
    pub fn audio_sent(&self) -> Duration {
        Duration::from_nanos(self.frames_sent * 1_000_000_000 / SAMPLE_RATE as u64)
    }

    /// How long to wait at `now` to fall back within the lead.
    pub fn delay_at(&self, now: Instant) -> Option<Duration> {
        let origin = self.origin?;
        let allowed = now.saturating_duration_since(origin) + self.lead;
        let sent = self.audio_sent();
        (sent > allowed).then(|| sent - allowed)
    }

    /// Record `frames` just sent and sleep if running too far ahead.
    pub async fn pace(&mut self, frames: u32) {
        let now = Instant::now();
        self.origin.get_or_insert(now);
        self.frames_sent += frames as u64;

        if let Some(delay) = self.delay_at(now) {
            trace!("Pacing: sleeping {:?}", delay);
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_delay_before_first_packet() {
        let pacer = Pacer::new(Duration::from_secs(1));
        assert!(pacer.delay_at(Instant::now()).is_none());
    }

    #[tokio::test]
    async fn within_lead_does_not_sleep() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..100 {
            pacer.pace(352).await;
        }
        // 100 packets is ~0.8s of audio, under the lead.
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(pacer.frames_sent(), 35_200);
    }

    #[tokio::test]
    async fn sleeps_when_ahead() {
        let mut pacer = Pacer::new(Duration::ZERO);
        let start = Instant::now();
        pacer.pace(4410).await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn delay_accounts_for_elapsed_time() {
        let mut pacer = Pacer::new(Duration::from_millis(500));
        let origin = Instant::now();
        pacer.origin = Some(origin);
        pacer.frames_sent = SAMPLE_RATE as u64 * 2;

        assert_eq!(pacer.delay_at(origin), Some(Duration::from_millis(1500)));
        assert_eq!(
            pacer.delay_at(origin + Duration::from_secs(1)),
            Some(Duration::from_millis(500))
        );
        assert!(pacer.delay_at(origin + Duration::from_secs(2)).is_none());
    }

    #[test]
    fn reset_clears_progress() {
        let mut pacer = Pacer::new(Duration::from_secs(1));
        pacer.origin = Some(Instant::now());
        pacer.frames_sent = 1000;
        pacer.reset();
        assert_eq!(pacer.frames_sent(), 0);
        assert!(pacer.delay_at(Instant::now()).is_none());
    }
}
