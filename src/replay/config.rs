//! Replay run parameters

use anyhow::{bail, Result};
use std::time::Duration;

/// Parameters for one replay run. Fixed for the whole run.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Time compression multiplier (>1 = faster than captured)
    pub speed: f64,
    /// Lower clamp for inter-event sleeps
    pub min_gap: Duration,
    /// Upper clamp for inter-event sleeps
    pub max_gap: Duration,
    /// Cap on the first paced gap (delay before the second event)
    pub first_gap_max: Duration,
    /// Multiplicative noise fraction, e.g. 0.3 = +/-30%
    pub jitter: f64,
    /// Probability of a burst after each base submission
    pub burst_prob: f64,
    /// Burst size bound, counting the base event already sent
    pub max_burst: usize,
    /// Gap between burst members
    pub burst_gap: Duration,
    /// Nominal in-flight cap (also the worker count)
    pub concurrency: usize,
    /// Draw a fresh admission limit in [1, concurrency] per submission
    pub randomize_concurrency: bool,
    /// Seed for reproducible jitter, bursts and limit draws
    pub seed: Option<u64>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 4.0,
            min_gap: Duration::from_millis(500),
            max_gap: Duration::from_secs(5),
            first_gap_max: Duration::from_secs(5),
            jitter: 0.3,
            burst_prob: 0.2,
            max_burst: 3,
            burst_gap: Duration::from_millis(50),
            concurrency: 1,
            randomize_concurrency: false,
            seed: None,
        }
    }
}

impl ReplayConfig {
    /// Reject parameter combinations that make pacing meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            bail!("speed must be a positive number, got {}", self.speed);
        }
        if self.min_gap > self.max_gap {
            bail!(
                "min gap ({:?}) must not exceed max gap ({:?})",
                self.min_gap,
                self.max_gap
            );
        }
        if !(0.0..1.0).contains(&self.jitter) {
            bail!("jitter must be in [0, 1), got {}", self.jitter);
        }
        if !(0.0..=1.0).contains(&self.burst_prob) {
            bail!("burst probability must be in [0, 1], got {}", self.burst_prob);
        }
        if self.max_burst == 0 {
            bail!("max burst must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }
}

/// Build a `Duration` from CLI seconds, rejecting negative, non-finite or
/// out-of-range input
pub fn secs(value: f64, name: &str) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        bail!("{} must be a non-negative number of seconds, got {}", name, value);
    }
    match Duration::try_from_secs_f64(value) {
        Ok(duration) => Ok(duration),
        Err(e) => bail!("{} of {} seconds is out of range: {}", name, value, e),
    }
}
