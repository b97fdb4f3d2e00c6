//! Diagnostic logging setup.
//!
//! Logs always go to stderr. Stdout belongs to the handshake line.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Default directive when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the global `tracing` subscriber.
///
/// A second call is a no-op, so tests and embedders that installed their
/// own subscriber are left alone.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
