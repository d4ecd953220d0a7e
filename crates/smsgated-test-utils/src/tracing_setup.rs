//! Tracing initialisation for tests.

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes through the test-harness capture and
/// honours `RUST_LOG` (defaulting to `info`).
///
/// Later calls are no-ops, so every test can call this unconditionally.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
