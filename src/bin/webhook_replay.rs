//! Webhook Replay Binary
//!
//! Replays a captured check-in webhook trace against a target URL,
//! reproducing the captured relative timing.
//!
//! Usage:
//!   webhook_replay --url https://abc.ngrok.app/webhook/eventmobi --input checkins.jsonl
//!   webhook_replay --input checkins.json --dry-run --seed 7
//!
//! Environment:
//!   REPLAY_URL - Target webhook URL
//!   REPLAY_INPUT - Trace file (JSONL or JSON array)
//!   REPLAY_SPEED, REPLAY_CONCURRENCY, REPLAY_SEED - see --help

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use checkin_replay::replay::{
    config::secs, Dispatcher, HttpDispatcher, ManualClock, NullDispatcher, ReplayConfig,
    ReplaySummary, Replayer,
};
use checkin_replay::telemetry::init_tracing;
use checkin_replay::trace::{load_events, Trace};

#[derive(Parser, Debug)]
#[command(name = "webhook_replay")]
#[command(about = "Replay captured check-in webhook payloads to a target URL")]
struct Args {
    /// Target webhook URL, e.g. https://abc.ngrok.app/webhook/eventmobi
    #[arg(long, env = "REPLAY_URL", required_unless_present = "dry_run")]
    url: Option<String>,

    /// Trace file: one JSON object per line, or a JSON array
    #[arg(long, env = "REPLAY_INPUT")]
    input: PathBuf,

    /// Playback speed multiplier (>1 = faster)
    #[arg(long, env = "REPLAY_SPEED", default_value_t = 4.0)]
    speed: f64,

    /// Minimum seconds to sleep between events
    #[arg(long, default_value_t = 0.5)]
    min_gap: f64,

    /// Maximum seconds to sleep between events
    #[arg(long, default_value_t = 5.0)]
    max_gap: f64,

    /// Maximum delay before the second event
    #[arg(long, default_value_t = 5.0)]
    first_gap_max: f64,

    /// Jitter fraction applied to inter-event sleeps (0.3 = +/-30%)
    #[arg(long, default_value_t = 0.3)]
    jitter: f64,

    /// Probability of sending a short burst after an event
    #[arg(long, default_value_t = 0.2)]
    burst_prob: f64,

    /// Maximum events in a burst, including the one already sent
    #[arg(long, default_value_t = 3)]
    max_burst: usize,

    /// Seconds between events inside a burst
    #[arg(long, default_value_t = 0.05)]
    burst_gap: f64,

    /// Max in-flight HTTP requests
    #[arg(long, env = "REPLAY_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Draw the in-flight limit from [1, concurrency] for every submission
    #[arg(long)]
    randomize_concurrency: bool,

    /// Seed for reproducible jitter, bursts and concurrency draws
    #[arg(long, env = "REPLAY_SEED")]
    seed: Option<u64>,

    /// Compute and print the schedule without sending or sleeping
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REPLAY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn replay_config(&self) -> Result<ReplayConfig> {
        let config = ReplayConfig {
            speed: self.speed,
            min_gap: secs(self.min_gap, "min gap")?,
            max_gap: secs(self.max_gap, "max gap")?,
            first_gap_max: secs(self.first_gap_max, "first gap max")?,
            jitter: self.jitter,
            burst_prob: self.burst_prob,
            max_burst: self.max_burst,
            burst_gap: secs(self.burst_gap, "burst gap")?,
            concurrency: self.concurrency,
            randomize_concurrency: self.randomize_concurrency,
            seed: self.seed,
        };
        config.validate()?;
        Ok(config)
    }
}

fn print_breakdown(summary: &ReplaySummary) {
    println!(
        "  delivered={} http_errors={} transport_failures={} bursts={} peak_in_flight={} elapsed={:.1}s",
        summary.delivery.delivered,
        summary.delivery.http_errors,
        summary.delivery.transport_failures,
        summary.bursts,
        summary.delivery.peak_in_flight,
        summary.elapsed.as_secs_f64()
    );
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = args.replay_config()?;
    let records = load_events(&args.input)?;
    let trace = Trace::sorted(records);

    info!(
        input = %args.input.display(),
        events = trace.len(),
        span_s = trace.span().map(|d| d.num_seconds()),
        "Trace ready"
    );

    if args.dry_run {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(NullDispatcher);
        let mut replayer = Replayer::with_clock(config, dispatcher, ManualClock::new())?;
        let summary = replayer.run(&trace)?;

        println!("{:>6}  {:>9}  {:>5}  {:>5}  resource_ids", "index", "delay_s", "burst", "limit");
        for s in &summary.schedule {
            let ids = trace
                .get(s.index)
                .map(|e| e.record.resource_ids().join(","))
                .unwrap_or_default();
            println!(
                "{:>6}  {:>9.3}  {:>5}  {:>5}  {}",
                s.index,
                s.delay.as_secs_f64(),
                if s.burst { "yes" } else { "" },
                s.limit,
                ids
            );
        }
        println!("Dry run: {} event(s) scheduled", summary.sent);
        print_breakdown(&summary);
        return Ok(());
    }

    let url = args.url.clone().unwrap_or_default();
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(HttpDispatcher::new(url.clone())?);
    let mut replayer = Replayer::new(config, dispatcher)?;
    let summary = replayer.run(&trace)?;

    if trace.is_empty() {
        println!("No events to replay");
    } else {
        println!("Replayed {} event(s) to {}", summary.sent, url);
        print_breakdown(&summary);
    }
    Ok(())
}
