use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs a compact `tracing` subscriber writing to stderr.
///
/// The filter is read from `RUST_LOG`, falling back to `default_filter` (or `info`).
/// Calling this more than once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or(DEFAULT_LOG_FILTER)));
    let _ = tracing_subscriber::fmt()
        .compact()
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}
