//! Check-in webhook replay tooling
//!
//! Re-delivers captured check-in webhooks to the dashboard's webhook
//! receiver with realistic timing, or generates synthetic ones.
//! Binaries under `src/bin/` wrap these modules.

pub mod models;
pub mod replay;
pub mod simulator;
pub mod sink;
pub mod telemetry;
pub mod trace;

pub use models::{EventId, EventRecord, Operation};
pub use replay::{ReplayConfig, ReplaySummary, Replayer};
pub use trace::Trace;
