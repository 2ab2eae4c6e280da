//! Trace replay engine
//!
//! Re-delivers a captured webhook trace to a target endpoint, reproducing
//! the captured relative timing (scaled by `speed`) with jitter, occasional
//! bursts and a bound on in-flight deliveries.
//!
//! - `pacer`: inter-event delays from trace timestamps
//! - `gate`: worker pool plus wait-for-any admission control
//! - `dispatch`: the HTTP POST itself
//! - `burst`: out-of-order pulls of near-future events
//! - `engine`: the control loop and final drain

pub mod burst;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod gate;
pub mod pacer;

pub use burst::BurstInjector;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReplayConfig;
pub use dispatch::{
    DispatchOutcome, Dispatcher, HttpDispatcher, NullDispatcher, DEFAULT_TIMEOUT, TRANSPORT_FAILURE,
};
pub use engine::{ReplaySummary, Replayer, ScheduledDispatch};
pub use gate::{effective_limit, ConcurrencyGate, DeliveryStats, DispatchHandle, DispatchPool};
pub use pacer::Pacer;
