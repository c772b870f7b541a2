//! Development-time tracing for the engine.
//!
//! Contract violations (rejected commits, missing bindings, refused
//! re-entrant stimuli) are emitted as `warn!` events; queue construction and
//! commits are `debug!`. Nothing is persisted.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the stderr subscriber used by the CLI.
///
/// The filter comes from `RUST_LOG` and falls back to `warn`, so rejected
/// commits are visible by default. Set `RUST_LOG=engine=debug` to also see
/// each action queue and the tags every commit wrote.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).without_time().compact())
        .init();
}
