//! Tracing subscriber setup for applications embedding the client.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `log_level` (e.g. from [`rtvtconf::TelemetryConfig`]).
///
/// Fails if a global subscriber is already set.
pub fn init(log_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| fallback_filter(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    tracing::debug!("tracing initialized at {}", log_level);
    Ok(())
}

fn fallback_filter(log_level: &str) -> EnvFilter {
    EnvFilter::new(log_level)
}
