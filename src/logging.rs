// Logging setup for binaries and tests
//
// Library code logs through the `log` macros. The fmt subscriber installs the
// `log` bridge, so those records land in the same output as `tracing` events.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber, honouring `RUST_LOG`
///
/// Safe to call more than once; once a global subscriber is set, later calls
/// leave it in place. Output goes to stderr so stdout stays free for JSON
/// reports.
pub fn init_logging() {
    init_logging_with(DEFAULT_FILTER);
}

/// Same as [`init_logging`] with a caller-chosen fallback filter
pub fn init_logging_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
