//! Synthetic check-in generator
//!
//! Sends freshly made `checkins` webhooks at random intervals for a fixed
//! duration. No trace and no concurrency: each delivery completes before the
//! next interval starts.

use anyhow::{bail, Result};
use chrono::{SecondsFormat, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{EventId, EventRecord, Operation};
use crate::replay::{Clock, DeliveryStats, Dispatcher, SystemClock};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_LENGTH: usize = 16;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub event_id: EventId,
    pub duration: Duration,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    pub fn new(event_id: impl Into<EventId>) -> Self {
        Self {
            event_id: event_id.into(),
            duration: Duration::from_secs(5 * 60),
            min_interval: Duration::from_secs(3),
            max_interval: Duration::from_secs(9),
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_interval.is_zero()
            || self.max_interval.is_zero()
            || self.max_interval < self.min_interval
        {
            bail!(
                "Invalid interval settings: ensure 0 < min <= max (min={:?}, max={:?})",
                self.min_interval,
                self.max_interval
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatorSummary {
    pub sent: usize,
    pub delivery: DeliveryStats,
    pub elapsed: Duration,
}

/// Pseudorandom check-in id such as `chk_3k9x0q...`
pub fn random_checkin_id(rng: &mut impl Rng) -> String {
    let suffix: String = (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("chk_{}", suffix)
}

/// A `create` check-in webhook stamped with the current time
pub fn synthetic_checkin(event_id: &EventId, rng: &mut impl Rng) -> EventRecord {
    EventRecord::checkin(
        Operation::Create,
        vec![random_checkin_id(rng)],
        event_id.clone(),
        Some(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
    )
}

pub struct Simulator<C: Clock = SystemClock> {
    config: SimulatorConfig,
    dispatcher: Arc<dyn Dispatcher>,
    clock: C,
    rng: ChaCha8Rng,
}

impl Simulator<SystemClock> {
    pub fn new(config: SimulatorConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self> {
        Self::with_clock(config, dispatcher, SystemClock)
    }
}

impl<C: Clock> Simulator<C> {
    /// Fails on invalid intervals, before anything is sent
    pub fn with_clock(config: SimulatorConfig, dispatcher: Arc<dyn Dispatcher>, clock: C) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            config,
            dispatcher,
            clock,
            rng,
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn run(&mut self) -> SimulatorSummary {
        let start = self.clock.now();
        let end = start + self.config.duration;
        let (min, max) = (
            self.config.min_interval.as_secs_f64(),
            self.config.max_interval.as_secs_f64(),
        );
        let mut summary = SimulatorSummary::default();

        info!(
            event_id = %self.config.event_id,
            duration_s = self.config.duration.as_secs_f64(),
            "Starting check-in simulation"
        );

        while self.clock.now() < end {
            let record = synthetic_checkin(&self.config.event_id, &mut self.rng);
            let status = self.dispatcher.dispatch(&record);
            summary.delivery.record(status);
            summary.sent += 1;
            debug!(status, resource_ids = ?record.resource_ids(), sent = summary.sent, "Check-in sent");

            let pause = Duration::try_from_secs_f64(self.rng.gen_range(min..=max))
                .unwrap_or(self.config.max_interval);
            let now = self.clock.now();
            if now + pause > end {
                self.clock.sleep(end.saturating_duration_since(now));
                break;
            }
            self.clock.sleep(pause);
        }

        summary.elapsed = self.clock.now() - start;
        info!(sent = summary.sent, elapsed_ms = summary.elapsed.as_millis() as u64, "Simulation finished");
        summary
    }
}
