use tracing_subscriber::{fmt, EnvFilter};

/// Directive used when neither `RUST_LOG` nor `LOG_LEVEL` holds a valid one.
/// Blank levels fall back to `info`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .or_else(|_| EnvFilter::try_new(default_level.trim()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global fmt subscriber. Call once, at the top of `main`.
pub fn init_tracing(default_level: &str) {
    fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(true)
        .init();
}
