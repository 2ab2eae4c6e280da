//! Webhook Simulator Binary
//!
//! Sends synthetic check-in webhooks to a target URL at random intervals
//! for a fixed duration.
//!
//! Usage:
//!   webhook_simulator --url https://example.com/webhook/eventmobi --event-id 12345 --minutes 2
//!
//! Environment:
//!   SIMULATOR_URL - Webhook endpoint URL
//!   SIMULATOR_EVENT_ID - Event ID included in payloads

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use checkin_replay::replay::{config::secs, HttpDispatcher};
use checkin_replay::simulator::{Simulator, SimulatorConfig};
use checkin_replay::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "webhook_simulator")]
#[command(about = "Simulate 'checkins' webhooks to a target URL")]
struct Args {
    /// Webhook endpoint URL
    #[arg(long, env = "SIMULATOR_URL")]
    url: String,

    /// Event ID to include in payloads
    #[arg(long, env = "SIMULATOR_EVENT_ID")]
    event_id: String,

    /// Duration to run in minutes
    #[arg(long, default_value_t = 5.0)]
    minutes: f64,

    /// Minimum seconds between webhooks
    #[arg(long, default_value_t = 3.0)]
    min_interval: f64,

    /// Maximum seconds between webhooks
    #[arg(long, default_value_t = 9.0)]
    max_interval: f64,

    /// Seed for reproducible ids and intervals
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = SimulatorConfig {
        duration: secs(args.minutes * 60.0, "duration")?,
        min_interval: secs(args.min_interval, "min interval")?,
        max_interval: secs(args.max_interval, "max interval")?,
        seed: args.seed,
        ..SimulatorConfig::new(args.event_id.clone())
    };
    // Checked before the HTTP client exists
    config.validate()?;

    let dispatcher = Arc::new(HttpDispatcher::new(args.url.clone())?);
    let mut simulator = Simulator::new(config, dispatcher)?;
    let summary = simulator.run();

    println!("Sent {} webhook(s) to {}", summary.sent, args.url);
    println!(
        "  delivered={} http_errors={} transport_failures={}",
        summary.delivery.delivered, summary.delivery.http_errors, summary.delivery.transport_failures
    );
    Ok(())
}
