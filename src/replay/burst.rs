//! Burst injector: occasionally pulls upcoming events forward so they arrive
//! close together, the way clustered check-ins do at a venue door.

use rand::Rng;
use std::time::Duration;

use super::config::ReplayConfig;

#[derive(Debug, Clone)]
pub struct BurstInjector {
    probability: f64,
    max_burst: usize,
    gap: Duration,
}

impl BurstInjector {
    pub fn new(config: &ReplayConfig) -> Self {
        Self {
            probability: config.burst_prob,
            max_burst: config.max_burst,
            gap: config.burst_gap,
        }
    }

    /// Sleep between burst members
    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Roll for a burst after a base submission.
    ///
    /// Returns how many extra events to pull, in `[1, max_burst - 1]`.
    /// `max_burst` counts the base event, so a bound of 1 never bursts.
    pub fn roll(&self, rng: &mut impl Rng) -> Option<usize> {
        if self.max_burst <= 1 || self.probability <= 0.0 {
            return None;
        }
        if rng.gen::<f64>() < self.probability {
            Some(rng.gen_range(1..=self.max_burst - 1))
        } else {
            None
        }
    }
}
