use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (usually
/// `Config::log_level`) is used. Calling this again after a subscriber is
/// installed is a no-op, so tests and demos can both call it.
pub fn init_tracing(service_name: &str, default_level: &str) {
    let installed = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
            // .json() for machine-readable output
        )
        .try_init();

    if installed.is_ok() {
        tracing::info!("Starting service: {}", service_name);
    }
}
