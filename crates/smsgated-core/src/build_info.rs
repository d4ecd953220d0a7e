//! Identifies exactly which build is running, for the startup log line and
//! `smsgated status`.

/// Short git commit hash at build time, or `"unknown"` outside a checkout.
pub const GIT_HASH: &str = env!("SMSGATED_GIT_HASH");

/// Cargo build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("SMSGATED_BUILD_PROFILE");

/// Crate version from the workspace manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `"0.1.0 (abc1234, release)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
