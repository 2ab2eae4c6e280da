//! Concurrency gate and dispatch worker pool
//!
//! The pool runs deliveries on a fixed set of worker threads fed by a job
//! queue; workers report completions on a channel. The gate owns the
//! in-flight set and is driven only from the pacing thread, so the set needs
//! no lock. Admission is cooperative: when the set is already at the limit
//! the gate waits for at least one completion before submitting.

use anyhow::{Context, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::dispatch::{DispatchOutcome, Dispatcher, TRANSPORT_FAILURE};
use crate::models::EventRecord;

/// Identifies one submitted delivery until its completion is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub handle: DispatchHandle,
    pub status: u16,
}

struct Job {
    handle: DispatchHandle,
    record: EventRecord,
}

/// Fixed-size pool of blocking dispatch workers
pub struct DispatchPool {
    jobs: Option<Sender<Job>>,
    completions: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,
    next_handle: u64,
}

impl DispatchPool {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, workers: usize) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let workers = (0..workers.max(1))
            .map(|i| {
                let jobs = job_rx.clone();
                let done = done_tx.clone();
                let dispatcher = dispatcher.clone();
                thread::Builder::new()
                    .name(format!("dispatch-{}", i))
                    .spawn(move || {
                        for job in jobs.iter() {
                            let status = dispatcher.dispatch(&job.record);
                            if done
                                .send(Completion {
                                    handle: job.handle,
                                    status,
                                })
                                .is_err()
                            {
                                break;
                            }
                        }
                    })
                    .context("Failed to spawn dispatch worker")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
            next_handle: 0,
        })
    }

    /// Queue a delivery without waiting for it
    pub fn submit(&mut self, record: EventRecord) -> DispatchHandle {
        let handle = DispatchHandle(self.next_handle);
        self.next_handle += 1;
        if let Some(jobs) = &self.jobs {
            if jobs.send(Job { handle, record }).is_err() {
                warn!(?handle, "Dispatch workers are gone; job dropped");
            }
        }
        handle
    }

    /// Block until any delivery completes. `None` once no worker is left.
    pub fn wait_any(&self) -> Option<Completion> {
        self.completions.recv().ok()
    }

    /// A completion that has already arrived, if any
    pub fn try_completion(&self) -> Option<Completion> {
        self.completions.try_recv().ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for DispatchPool {
    fn drop(&mut self) {
        // Closing the job queue lets workers finish and exit
        self.jobs.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// Admission limit for one submission.
///
/// Fixed at `concurrency` unless randomized, in which case each submission
/// draws its own limit uniformly from `[1, concurrency]`.
pub fn effective_limit(concurrency: usize, randomize: bool, rng: &mut impl Rng) -> usize {
    let concurrency = concurrency.max(1);
    if randomize {
        rng.gen_range(1..=concurrency)
    } else {
        concurrency
    }
}

/// Delivery results accumulated as completions are observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub http_errors: usize,
    pub transport_failures: usize,
    /// Largest in-flight set size seen right after a submission
    pub peak_in_flight: usize,
}

impl DeliveryStats {
    pub(crate) fn record(&mut self, status: u16) {
        match DispatchOutcome::from_status(status) {
            DispatchOutcome::Delivered => self.delivered += 1,
            DispatchOutcome::HttpError => self.http_errors += 1,
            DispatchOutcome::TransportFailure => self.transport_failures += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.delivered + self.http_errors + self.transport_failures
    }
}

/// Bounds outstanding deliveries with wait-for-any backpressure
pub struct ConcurrencyGate {
    pool: DispatchPool,
    in_flight: HashSet<DispatchHandle>,
    stats: DeliveryStats,
}

impl ConcurrencyGate {
    pub fn new(pool: DispatchPool) -> Self {
        Self {
            pool,
            in_flight: HashSet::new(),
            stats: DeliveryStats::default(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Submit `record` once the in-flight set is below `limit`.
    ///
    /// Waits for at most one round of completions, so with a limit that
    /// varies per call the set can briefly exceed a small limit.
    pub fn admit(&mut self, record: EventRecord, limit: usize) -> DispatchHandle {
        if self.in_flight.len() >= limit.max(1) {
            self.wait_for_any();
        }
        let handle = self.pool.submit(record);
        self.in_flight.insert(handle);
        self.stats.peak_in_flight = self.stats.peak_in_flight.max(self.in_flight.len());
        handle
    }

    fn observe(&mut self, completion: Completion) {
        if self.in_flight.remove(&completion.handle) {
            self.stats.record(completion.status);
            debug!(
                handle = ?completion.handle,
                status = completion.status,
                in_flight = self.in_flight.len(),
                "Dispatch completed"
            );
        }
    }

    fn abandon_all(&mut self) {
        warn!(
            in_flight = self.in_flight.len(),
            "Dispatch workers exited with deliveries outstanding"
        );
        for _ in self.in_flight.drain() {
            self.stats.record(TRANSPORT_FAILURE);
        }
    }

    /// Block for one completion, then take every other one already queued
    fn wait_for_any(&mut self) {
        match self.pool.wait_any() {
            Some(completion) => self.observe(completion),
            None => return self.abandon_all(),
        }
        while let Some(completion) = self.pool.try_completion() {
            self.observe(completion);
        }
    }

    /// Wait for every outstanding delivery and return the totals
    pub fn drain(mut self) -> DeliveryStats {
        while !self.in_flight.is_empty() {
            match self.pool.wait_any() {
                Some(completion) => self.observe(completion),
                None => self.abandon_all(),
            }
        }
        self.stats.clone()
    }
}
