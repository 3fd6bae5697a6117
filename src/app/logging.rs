//! Logging setup for the `vrb` binary.
//!
//! The library logs through the `log` facade. Here those records are bridged
//! into a `tracing-subscriber` pipeline with an `EnvFilter` read from
//! `VRB_LOG`, then `RUST_LOG`, then the CLI default.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "VRB_LOG";

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. Later calls are no-ops.
pub fn init(default_level: &str) {
    if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let _ = LogTracer::builder()
        .with_max_level(log::LevelFilter::Trace)
        .init();

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(default_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}
