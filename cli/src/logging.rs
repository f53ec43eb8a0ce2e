//! Logging configuration
//!
//! Logs go to stderr so they don't interleave with REPL output on stdout.
//! Set `DEBUG_LOGGING=1` to enable debug output for buffkit crates, or
//! `RUST_LOG` for a custom filter.

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Filter used when `DEBUG_LOGGING` is set
const DEBUG_FILTER: &str = "info,buffkit_core=debug,buffkit_cli=debug";

/// Initialize the global tracing subscriber
pub fn init() {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let filter = if debug_logging {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();

    tracing::debug!(debug_logging, "Logging initialized");
}
