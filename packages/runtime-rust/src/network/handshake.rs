//! The stdout handshake contract with the host.
//!
//! Stdout carries exactly one line for the lifetime of the process:
//! `1|1|tcp|127.0.0.1:<port>|grpc`. Everything else goes to stderr.

use std::io::{self, Write};

use subtle::ConstantTimeEq;

use crate::config::{MAGIC_COOKIE_ENV, MAGIC_COOKIE_VALUE};

/// Core protocol version announced in the handshake.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Application protocol version announced in the handshake.
pub const APP_PROTOCOL_VERSION: u32 = 1;

/// Loopback address the listener binds to.
pub const LISTEN_HOST: &str = "127.0.0.1";

/// Errors that abort the process before serving starts.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(
        "{} is not set; this binary is a plugin and must be launched by its host",
        MAGIC_COOKIE_ENV
    )]
    MissingSecret,
    #[error("{} does not match the expected value", MAGIC_COOKIE_ENV)]
    InvalidSecret,
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] clap::Error),
    #[error("failed to bind RPC listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write handshake: {0}")]
    Handshake(#[source] io::Error),
    #[error("serve() called before bind()")]
    NotBound,
    #[error("RPC server failed: {0}")]
    Serve(#[from] tonic::transport::Error),
    #[error("RPC server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Checks the secret in constant time.
///
/// # Errors
///
/// Returns [`BootstrapError::MissingSecret`] or
/// [`BootstrapError::InvalidSecret`].
pub fn validate_secret(secret: Option<&str>) -> Result<(), BootstrapError> {
    let secret = secret.ok_or(BootstrapError::MissingSecret)?;
    if bool::from(secret.as_bytes().ct_eq(MAGIC_COOKIE_VALUE.as_bytes())) {
        Ok(())
    } else {
        Err(BootstrapError::InvalidSecret)
    }
}

/// Formats the handshake line, including the trailing newline.
#[must_use]
pub fn handshake_line(port: u16) -> String {
    format!("{CORE_PROTOCOL_VERSION}|{APP_PROTOCOL_VERSION}|tcp|{LISTEN_HOST}:{port}|grpc\n")
}

/// Writes the handshake line and flushes.
///
/// # Errors
///
/// Returns [`BootstrapError::Handshake`] if the write fails.
pub fn write_handshake<W: Write>(out: &mut W, port: u16) -> Result<(), BootstrapError> {
    out.write_all(handshake_line(port).as_bytes())
        .and_then(|()| out.flush())
        .map_err(BootstrapError::Handshake)
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    #[test]
    fn missing_secret_is_rejected() {
        assert!(matches!(
            validate_secret(None),
            Err(BootstrapError::MissingSecret)
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        assert!(matches!(
            validate_secret(Some("not-the-cookie")),
            Err(BootstrapError::InvalidSecret)
        ));
        assert!(matches!(
            validate_secret(Some("")),
            Err(BootstrapError::InvalidSecret)
        ));
    }

    #[test]
    fn expected_secret_is_accepted() {
        assert!(validate_secret(Some(MAGIC_COOKIE_VALUE)).is_ok());
    }

    #[test]
    fn handshake_line_matches_host_pattern() {
        let pattern = Regex::new(r"^\d+\|\d+\|tcp\|127\.0\.0\.1:\d+\|grpc\n?$").unwrap();
        let line = handshake_line(50051);
        assert_eq!(line, "1|1|tcp|127.0.0.1:50051|grpc\n");
        assert!(pattern.is_match(&line));
    }

    #[test]
    fn write_handshake_emits_exactly_one_line() {
        let mut out = Vec::new();
        write_handshake(&mut out, 4000).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }
}
