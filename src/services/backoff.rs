use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Exponential backoff for failing poll ticks, with up to 10% jitter.
///
/// A zero `max` disables backoff entirely.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
    resume_at: Option<Instant>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            resume_at: None,
        }
    }

    #[cfg(test)]
    fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay before the next attempt after `failures` consecutive failures, without jitter.
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures <= 1 || self.max.is_zero() {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.delay_for(self.failures);
        if delay.is_zero() {
            self.resume_at = None;
            return delay;
        }
        let jitter_ms = (delay.as_millis() as u64) / 10;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms));
        let delay = delay + jitter;
        self.resume_at = Some(Instant::now() + delay);
        delay
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.resume_at = None;
    }

    pub fn ready(&self, now: Instant) -> bool {
        self.resume_at.map_or(true, |resume_at| now >= resume_at)
    }
}
