//! Runtime configuration, sourced from the process environment.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Environment variable carrying the pre-shared handshake secret.
pub const MAGIC_COOKIE_ENV: &str = "PLUGKIT_MAGIC_COOKIE";

/// The only secret value the runtime accepts.
pub const MAGIC_COOKIE_VALUE: &str = "7f3e9a1c5b2d4e60a8c1f9b3d7e2a4c6";

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PLUGKIT_PORT";

/// Log output format for the diagnostic stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration for the plugin runtime.
///
/// Every field is read from an environment variable. The host launches
/// plugins without arguments, so [`RuntimeConfig::from_env`] parses an
/// empty argument list.
#[derive(Debug, Clone, Parser)]
#[command(name = "plugkit-plugin", about = "plugkit plugin runtime")]
pub struct RuntimeConfig {
    /// Pre-shared secret; validated before anything else runs.
    #[arg(long, env = MAGIC_COOKIE_ENV, hide_env_values = true)]
    pub magic_cookie: Option<String>,

    /// Listener port. 0 (or unset) means OS-assigned.
    #[arg(long, env = PORT_ENV, default_value_t = 0)]
    pub port: u16,

    /// Seconds to wait for in-flight calls during shutdown.
    #[arg(long, env = "PLUGKIT_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Diagnostic log format.
    #[arg(long, env = "PLUGKIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl RuntimeConfig {
    /// Reads configuration from the environment only.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable holds an unparseable
    /// value (e.g. a non-numeric port).
    pub fn from_env() -> Result<Self, clap::Error> {
        Self::try_parse_from(["plugkit-plugin"])
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            magic_cookie: None,
            port: 0,
            shutdown_grace_secs: 5,
            log_format: LogFormat::Text,
        }
    }
}

/// Static identity of the plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
}

impl PluginInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_config_defaults() {
        let config = RuntimeConfig::default();
        assert!(config.magic_cookie.is_none());
        assert_eq!(config.port, 0);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn flags_parse_like_environment() {
        // Flags and env vars share one definition; flags avoid mutating the
        // test process environment.
        let config = RuntimeConfig::try_parse_from([
            "plugkit-plugin",
            "--port",
            "5005",
            "--log-format",
            "json",
            "--magic-cookie",
            "abc",
        ])
        .unwrap();
        assert_eq!(config.port, 5005);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.magic_cookie.as_deref(), Some("abc"));
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        let result = RuntimeConfig::try_parse_from(["plugkit-plugin", "--port", "http"]);
        assert!(result.is_err());
    }
}
