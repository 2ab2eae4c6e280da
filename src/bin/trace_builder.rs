//! Trace Builder Binary
//!
//! Converts an export of check-in objects into a webhook trace that
//! `webhook_replay` can play back.
//!
//! Usage:
//!   trace_builder --input checkins_export.json --event-id 12345 --output trace.jsonl
//!   trace_builder --input checkins_export.json --event-id 12345 --output trace.txt --json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use checkin_replay::models::EventId;
use checkin_replay::telemetry::init_tracing;
use checkin_replay::trace::{build_trace, builder::checkins_from_str, write_trace, TraceFormat};

#[derive(Parser, Debug)]
#[command(name = "trace_builder")]
#[command(about = "Turn exported check-ins into webhook-style payloads for replay")]
struct Args {
    /// Exported check-ins: JSON array, {"data": [...]} envelope, or JSONL
    #[arg(long)]
    input: PathBuf,

    /// Event ID written into every payload
    #[arg(long, env = "TRACE_EVENT_ID")]
    event_id: String,

    /// Output path (.jsonl or .json)
    #[arg(long)]
    output: PathBuf,

    /// Write a JSON array instead of JSONL
    #[arg(long = "json")]
    as_json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let text = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read check-in export {}", args.input.display()))?;
    let checkins = checkins_from_str(&text);
    info!(checkins = checkins.len(), "Check-ins loaded");

    let records = build_trace(&checkins, &EventId::from(args.event_id.clone()));
    let format = TraceFormat::for_path(&args.output, args.as_json);
    let written = write_trace(&args.output, &records, format)?;

    println!("Wrote {} webhook event(s) to {}", written, args.output.display());
    Ok(())
}
