//! Process-wide logging initialization.
//!
//! `conduit` is a long-running local daemon, not a batch job, so logging is
//! the primary observability surface: every crate instruments its public
//! async entry points with `#[instrument]` and this function wires those
//! spans/events to an output format controlled by the environment.

use tracing::instrument;
use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber.
///
/// Log level is controlled by `RUST_LOG` (defaulting to `info` when unset).
/// Output format is controlled by `CONDUIT_LOG_FORMAT`:
/// - `json` — newline-delimited JSON, one object per event
/// - anything else or unset — human-readable `fmt` output
///
/// Safe to call once at process startup; a second call returns an error
/// rather than panicking, since `tracing`'s global subscriber can only be
/// set once per process.
#[instrument]
pub fn init_observability(service_name: &'static str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = std::env::var("CONDUIT_LOG_FORMAT").unwrap_or_default();

    let result = if format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    result.map_err(|e| format!("failed to initialize tracing subscriber for {service_name}: {e}"))
}
