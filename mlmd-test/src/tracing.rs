//! Test logging for the benchmark and store crates.

use tracing_subscriber::EnvFilter;

/// Crates whose events are captured at every level; everything else only logs errors.
const WORKSPACE_CRATES: [&str; 2] = ["mlmd_bench", "mlmd_store"];

/// Returns the directives used when `RUST_LOG` is not set.
pub fn default_directives() -> String {
    WORKSPACE_CRATES
        .iter()
        .fold(String::from("ERROR"), |directives, name| {
            format!("{directives},{name}=TRACE")
        })
}

/// Builds the filter for test logs, preferring `RUST_LOG` when it holds valid directives.
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives()))
}

/// Routes logs of the current test to the output captured by the test harness.
///
/// Safe to call from every test; only the first call installs a subscriber.
///
/// ```
/// mlmd_test::tracing::init();
/// mlmd_test::tracing::init();
/// ```
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .with_thread_names(true)
        .compact()
        .try_init();
}
