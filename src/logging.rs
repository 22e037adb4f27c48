/// Installs the global `tracing` subscriber. Honors `RUST_LOG`, defaulting to info for this crate.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "yt_grabber=info".into());

    // A subscriber may already be installed (tests, repeated init).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
