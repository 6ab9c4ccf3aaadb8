// src/log.rs
//
// Global tracing subscriber. Filter comes from RUST_LOG, default "info".

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: human-readable lines, or one JSON object per
/// event when `json` is set. A second call is a no-op.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Already installed (tests, embedding): keep the existing one.
    let _ = if json {
        registry.with(fmt::layer().json().with_current_span(true).with_span_list(false)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false).compact()).try_init()
    };
}
