//! Replay loop
//!
//! One control thread walks the sorted trace: sleep for the paced delay,
//! admit the event through the concurrency gate, maybe pull a burst of the
//! following events forward, repeat. Once the trace is exhausted every
//! outstanding delivery is drained before the summary is returned.

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::burst::BurstInjector;
use super::clock::{Clock, SystemClock};
use super::config::ReplayConfig;
use super::dispatch::Dispatcher;
use super::gate::{effective_limit, ConcurrencyGate, DeliveryStats, DispatchPool};
use super::pacer::Pacer;
use crate::trace::{Trace, TraceEntry};

/// One submission, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledDispatch {
    /// Position in the sorted trace
    pub index: usize,
    /// Sleep taken right before this submission
    pub delay: Duration,
    /// Pulled forward by a burst
    pub burst: bool,
    /// Admission limit drawn for this submission
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub sent: usize,
    pub bursts: usize,
    pub delivery: DeliveryStats,
    pub schedule: Vec<ScheduledDispatch>,
    pub elapsed: Duration,
}

pub struct Replayer<C: Clock = SystemClock> {
    config: ReplayConfig,
    dispatcher: Arc<dyn Dispatcher>,
    clock: C,
    rng: ChaCha8Rng,
}

impl Replayer<SystemClock> {
    pub fn new(config: ReplayConfig, dispatcher: Arc<dyn Dispatcher>) -> Result<Self> {
        Self::with_clock(config, dispatcher, SystemClock)
    }
}

impl<C: Clock> Replayer<C> {
    pub fn with_clock(config: ReplayConfig, dispatcher: Arc<dyn Dispatcher>, clock: C) -> Result<Self> {
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

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn admit(
        &mut self,
        gate: &mut ConcurrencyGate,
        index: usize,
        entry: &TraceEntry,
        delay: Duration,
        burst: bool,
    ) -> ScheduledDispatch {
        let limit = effective_limit(
            self.config.concurrency,
            self.config.randomize_concurrency,
            &mut self.rng,
        );
        gate.admit(entry.record.clone(), limit);
        debug!(
            index,
            burst,
            limit,
            delay_ms = delay.as_millis() as u64,
            in_flight = gate.in_flight(),
            "Event submitted"
        );
        ScheduledDispatch {
            index,
            delay,
            burst,
            limit,
        }
    }

    /// Replay `trace` to completion. Delivery failures are counted, never raised.
    pub fn run(&mut self, trace: &Trace) -> Result<ReplaySummary> {
        if trace.is_empty() {
            info!("No events to replay");
            return Ok(ReplaySummary::default());
        }

        info!(
            events = trace.len(),
            speed = self.config.speed,
            concurrency = self.config.concurrency,
            randomize_concurrency = self.config.randomize_concurrency,
            "Starting replay"
        );

        let started = self.clock.now();
        let mut pacer = Pacer::new(&self.config);
        let burst = BurstInjector::new(&self.config);
        let pool = DispatchPool::new(self.dispatcher.clone(), self.config.concurrency)?;
        let mut gate = ConcurrencyGate::new(pool);
        let mut schedule: Vec<ScheduledDispatch> = Vec::with_capacity(trace.len());
        let mut bursts = 0;
        let mut cursor = 0;

        while let Some(entry) = trace.get(cursor) {
            let delay = pacer.delay_for(entry.timestamp, schedule.len(), &mut self.rng);
            self.clock.sleep(delay);
            let scheduled = self.admit(&mut gate, cursor, entry, delay, false);
            schedule.push(scheduled);
            pacer.observe(entry.timestamp);
            cursor += 1;

            if cursor >= trace.len() {
                break;
            }
            let Some(count) = burst.roll(&mut self.rng) else {
                continue;
            };
            bursts += 1;
            debug!(count, at = cursor, "Burst");
            for _ in 0..count {
                let Some(member) = trace.get(cursor) else {
                    break;
                };
                self.clock.sleep(burst.gap());
                let scheduled = self.admit(&mut gate, cursor, member, burst.gap(), true);
                schedule.push(scheduled);
                pacer.observe(member.timestamp);
                cursor += 1;
            }
        }

        let delivery = gate.drain();
        let summary = ReplaySummary {
            sent: schedule.len(),
            bursts,
            delivery,
            schedule,
            elapsed: self.clock.now() - started,
        };

        info!(
            sent = summary.sent,
            delivered = summary.delivery.delivered,
            http_errors = summary.delivery.http_errors,
            transport_failures = summary.delivery.transport_failures,
            bursts = summary.bursts,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Replay finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventId, EventRecord, Operation};
    use crate::replay::clock::ManualClock;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        seen: Mutex<Vec<String>>,
    }

    impl Dispatcher for RecordingDispatcher {
        fn dispatch(&self, record: &EventRecord) -> u16 {
            self.seen.lock().push(record.resource_ids()[0].clone());
            202
        }
    }

    fn trace_at(offsets: &[i64]) -> Trace {
        let records = offsets
            .iter()
            .enumerate()
            .map(|(i, secs)| {
                let ts = chrono::DateTime::from_timestamp(1_714_557_600 + secs, 0).unwrap();
                EventRecord::checkin(
                    Operation::Create,
                    vec![format!("chk_{}", i)],
                    EventId::from("ev"),
                    Some(ts.to_rfc3339()),
                )
            })
            .collect();
        Trace::sorted(records)
    }

    fn quiet_config() -> ReplayConfig {
        ReplayConfig {
            speed: 2.0,
            min_gap: Duration::ZERO,
            max_gap: Duration::from_secs(999),
            first_gap_max: Duration::from_secs(999),
            jitter: 0.0,
            burst_prob: 0.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn run(config: ReplayConfig, trace: &Trace) -> (ReplaySummary, Vec<Duration>, Vec<String>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut replayer =
            Replayer::with_clock(config, dispatcher.clone(), ManualClock::new()).unwrap();
        let summary = replayer.run(trace).unwrap();
        let sleeps = replayer.clock().sleeps().to_vec();
        let seen = dispatcher.seen.lock().clone();
        (summary, sleeps, seen)
    }

    #[test]
    fn test_relative_timing_is_scaled() {
        let (summary, sleeps, _) = run(quiet_config(), &trace_at(&[0, 10, 20]));

        assert_eq!(summary.sent, 3);
        assert_eq!(
            sleeps,
            vec![Duration::ZERO, Duration::from_secs(5), Duration::from_secs(5)]
        );
        assert_eq!(summary.elapsed, Duration::from_secs(10));
    }

    #[test]
    fn test_no_bursts_keeps_trace_order() {
        let trace = trace_at(&[30, 0, 20, 10, 40]);
        let (summary, _, seen) = run(quiet_config(), &trace);

        assert_eq!(summary.sent, 5);
        assert_eq!(summary.bursts, 0);
        assert_eq!(summary.delivery.delivered, 5);
        let indices: Vec<usize> = summary.schedule.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(seen, vec!["chk_1", "chk_3", "chk_2", "chk_0", "chk_4"]);
    }

    #[test]
    fn test_always_burst_follows_each_base_event() {
        let config = ReplayConfig {
            burst_prob: 1.0,
            max_burst: 3,
            ..quiet_config()
        };
        let offsets: Vec<i64> = (0..20).map(|i| i * 4).collect();
        let (summary, _, _) = run(config, &trace_at(&offsets));

        assert_eq!(summary.sent, 20);
        assert!(summary.bursts > 0);
        let schedule = &summary.schedule;
        for (pos, s) in schedule.iter().enumerate() {
            assert_eq!(s.index, pos, "submissions follow trace positions");
            if !s.burst && s.index + 1 < schedule.len() {
                let extras = schedule[pos + 1..]
                    .iter()
                    .take_while(|n| n.burst)
                    .count();
                assert!((1..=2).contains(&extras), "base {} had {} extras", pos, extras);
            }
        }
        assert!(schedule
            .iter()
            .filter(|s| s.burst)
            .all(|s| s.delay == Duration::from_millis(50)));
    }

    #[test]
    fn test_pacing_after_burst_uses_trace_time() {
        let config = ReplayConfig {
            speed: 1.0,
            burst_prob: 1.0,
            max_burst: 2,
            ..quiet_config()
        };
        // 0 base, 10 burst, 25 base: gap measured from the burst member
        let (summary, _, _) = run(config, &trace_at(&[0, 10, 25]));

        let delays: Vec<(bool, Duration)> =
            summary.schedule.iter().map(|s| (s.burst, s.delay)).collect();
        assert_eq!(
            delays,
            vec![
                (false, Duration::ZERO),
                (true, Duration::from_millis(50)),
                (false, Duration::from_secs(15)),
            ]
        );
    }

    #[test]
    fn test_first_gap_cap_lands_on_first_paced_gap_after_burst() {
        let config = ReplayConfig {
            speed: 1.0,
            burst_prob: 1.0,
            max_burst: 2,
            first_gap_max: Duration::from_secs(2),
            ..quiet_config()
        };
        let (summary, _, _) = run(config, &trace_at(&[0, 10, 25, 26, 60]));

        let delays: Vec<(bool, Duration)> =
            summary.schedule.iter().map(|s| (s.burst, s.delay)).collect();
        assert_eq!(
            delays,
            vec![
                (false, Duration::ZERO),
                (true, Duration::from_millis(50)),
                (false, Duration::from_secs(2)),
                (true, Duration::from_millis(50)),
                (false, Duration::from_secs(34)),
            ]
        );
    }

    #[test]
    fn test_gaps_clamped_with_jitter_and_first_gap_capped() {
        let config = ReplayConfig {
            speed: 1.0,
            min_gap: Duration::from_millis(500),
            max_gap: Duration::from_secs(5),
            first_gap_max: Duration::from_secs(2),
            jitter: 0.5,
            ..quiet_config()
        };
        let offsets = [0, 60, 61, 61, 70, 200, 201, 230, 231, 232];
        let (summary, _, _) = run(config, &trace_at(&offsets));

        let delays: Vec<Duration> = summary.schedule.iter().map(|s| s.delay).collect();
        assert_eq!(delays[0], Duration::ZERO);
        assert!(delays[1] <= Duration::from_secs(2));
        for d in &delays[2..] {
            assert!(*d >= Duration::from_millis(500) && *d <= Duration::from_secs(5), "{:?}", d);
        }
    }

    #[test]
    fn test_fixed_concurrency_peak_is_bounded() {
        let config = ReplayConfig {
            concurrency: 3,
            ..quiet_config()
        };
        let offsets: Vec<i64> = (0..30).collect();
        let (summary, _, seen) = run(config, &trace_at(&offsets));

        assert_eq!(seen.len(), 30);
        assert!(summary.delivery.peak_in_flight <= 4);
        assert!(summary.schedule.iter().all(|s| s.limit == 3));
    }

    #[test]
    fn test_randomized_limits_are_drawn_per_submission() {
        let config = ReplayConfig {
            concurrency: 4,
            randomize_concurrency: true,
            ..quiet_config()
        };
        let offsets: Vec<i64> = (0..60).collect();
        let (summary, _, _) = run(config, &trace_at(&offsets));

        let limits: Vec<usize> = summary.schedule.iter().map(|s| s.limit).collect();
        assert!(limits.iter().all(|l| (1..=4).contains(l)));
        assert!(limits.iter().any(|&l| l != limits[0]));
        assert!(summary.delivery.peak_in_flight <= 4);
    }

    #[test]
    fn test_same_seed_same_schedule() {
        let config = ReplayConfig {
            speed: 1.0,
            min_gap: Duration::from_millis(100),
            max_gap: Duration::from_secs(3),
            jitter: 0.3,
            burst_prob: 0.4,
            ..quiet_config()
        };
        let trace = trace_at(&[0, 1, 3, 7, 8, 20, 21, 22, 40]);
        let (a, _, _) = run(config.clone(), &trace);
        let (b, _, _) = run(config, &trace);
        assert_eq!(a.schedule, b.schedule);
    }

    #[test]
    fn test_empty_trace_sends_nothing() {
        let (summary, sleeps, seen) = run(quiet_config(), &Trace::default());
        assert_eq!(summary.sent, 0);
        assert!(sleeps.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = ReplayConfig {
            concurrency: 0,
            ..quiet_config()
        };
        let dispatcher = Arc::new(RecordingDispatcher::default());
        assert!(Replayer::with_clock(config, dispatcher, ManualClock::new()).is_err());
    }
}
