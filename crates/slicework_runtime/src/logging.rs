//! Log output for the binary and for tests that want to see events.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence; `default_filter` (for example `"warn"` or
/// `"slicework_slice=debug"`) applies when it is unset or invalid. Returns
/// false if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
