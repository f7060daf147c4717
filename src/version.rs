//! Harness version, stamped into the first line of every generated file.

/// Cargo package version of the harness (for example, `0.1.0-alpha.1`).
pub const GENVERIFY_VERSION: &str = env!("CARGO_PKG_VERSION");
