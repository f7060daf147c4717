//! `genverify` binary: generate artifacts, serve them, run them headlessly and wait for the sentinel.
//!
//! Exits 0 when the sentinel alert arrives, 2 when the wait times out and 1 on any other failure.

fn main() {
    // RUST_LOG overrides; run progress (`handle(...)`, `alert: ...`, hot generation time) logs at info.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();

    genverify::cli::run();
}
