//! Webhook Sink Binary
//!
//! Local stand-in for the dashboard's webhook receiver. Point
//! `webhook_replay` or `webhook_simulator` at it to watch traffic shape.
//!
//! Usage:
//!   webhook_sink --port 5000
//!   webhook_sink --port 5000 --status 503 --delay-ms 250
//!
//! Environment:
//!   SINK_PORT   - Listen port (default: 5000)
//!   SINK_RETAIN - Payloads kept in memory (default: 1000)

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use checkin_replay::sink::{serve, SinkConfig, SinkState, DEFAULT_RETAIN};
use checkin_replay::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "webhook_sink")]
#[command(about = "Receive and count check-in webhooks locally")]
struct Args {
    /// Listen host
    #[arg(long, env = "SINK_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(long, env = "SINK_PORT", default_value = "5000")]
    port: u16,

    /// Status code returned for accepted webhooks
    #[arg(long, default_value = "200")]
    status: u16,

    /// Artificial processing delay per webhook in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Most recent payloads kept in memory (0 = count only)
    #[arg(long, env = "SINK_RETAIN", default_value_t = DEFAULT_RETAIN)]
    retain: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let bind_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let config = SinkConfig {
        bind_addr,
        status: StatusCode::from_u16(args.status).context("Invalid --status")?,
        delay: Duration::from_millis(args.delay_ms),
        retain: args.retain,
    };

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    let state = SinkState::new(config);

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received");
    };
    serve(listener, state.clone(), shutdown).await?;

    println!("Received {} webhook(s)", state.received_count());
    Ok(())
}
