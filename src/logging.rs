//! Log output for the `docbind` binary.

/// Installs a stderr fmt subscriber. `RUST_LOG` takes precedence over
/// `level`, which applies to both docbind crates.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("docbind={level},docbind_core={level}")));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
