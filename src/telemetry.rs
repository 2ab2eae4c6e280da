//! Logging setup shared by the binaries

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map a `--log-level` value to a tracing level; unknown values mean info
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Filter used when `RUST_LOG` is unset: dependencies at info, this crate at `level`
pub fn default_directives(level: &str) -> String {
    format!(
        "info,checkin_replay={}",
        parse_level(level).as_str().to_lowercase()
    )
}

/// Install the global fmt subscriber. A set `RUST_LOG` replaces the defaults.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init();
}
