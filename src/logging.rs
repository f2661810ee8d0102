use tracing_subscriber::EnvFilter;

/// Structured logging to stderr. `RUST_LOG` wins over `log_level` when set.
/// Stdout stays free for the JSON report.
pub fn init(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
