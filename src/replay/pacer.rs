//! Pacer: turns captured inter-event deltas into sleep durations

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use super::config::ReplayConfig;

/// Pacing state for one replay run.
///
/// `last_timestamp` follows the most recently scheduled event, burst members
/// included, so pacing after a burst stays relative to trace time.
#[derive(Debug, Clone)]
pub struct Pacer {
    speed: f64,
    min_gap: f64,
    max_gap: f64,
    first_gap_max: f64,
    jitter: f64,
    last_timestamp: Option<DateTime<Utc>>,
    first_gap_applied: bool,
}

impl Pacer {
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            speed: config.speed.max(1e-6),
            min_gap: config.min_gap.as_secs_f64(),
            max_gap: config.max_gap.as_secs_f64(),
            first_gap_max: config.first_gap_max.as_secs_f64(),
            jitter: config.jitter,
            last_timestamp: None,
            first_gap_applied: false,
        }
    }

    fn clamp(&self, secs: f64) -> f64 {
        self.min_gap.max(self.max_gap.min(secs))
    }

    /// Delay to wait before dispatching a base event stamped `timestamp`.
    ///
    /// `sent` is the number of events dispatched so far; nothing is waited
    /// before the very first one.
    pub fn delay_for(
        &mut self,
        timestamp: Option<DateTime<Utc>>,
        sent: usize,
        rng: &mut impl Rng,
    ) -> Duration {
        let secs = match (self.last_timestamp, timestamp) {
            (Some(last), Some(ts)) => {
                let delta = (ts - last).to_std().map(|d| d.as_secs_f64()).unwrap_or(0.0);
                let mut secs = self.clamp(delta / self.speed);
                if self.jitter > 0.0 {
                    let factor = rng.gen_range((1.0 - self.jitter).max(0.0)..=1.0 + self.jitter);
                    secs = self.clamp(secs * factor);
                }
                secs
            }
            _ if sent > 0 => self.min_gap,
            _ => return Duration::ZERO,
        };

        let secs = if self.first_gap_applied {
            secs
        } else {
            self.first_gap_applied = true;
            secs.min(self.first_gap_max)
        };
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Record a scheduled event; events without a timestamp keep the previous one
    pub fn observe(&mut self, timestamp: Option<DateTime<Utc>>) {
        if timestamp.is_some() {
            self.last_timestamp = timestamp;
        }
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }
}
