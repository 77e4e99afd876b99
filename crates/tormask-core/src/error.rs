//! Error types for the tormask system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for tormask operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the tormask system
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate location yielded a readable, non-empty cookie
    #[error("Auth cookie not found: {0}")]
    CookieNotFound(String),

    /// The daemon rejected the AUTHENTICATE line
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The daemon rejected the SIGNAL line
    #[error("Signal rejected: {0}")]
    SignalRejected(String),

    /// Control-channel connect, I/O or timeout failure
    #[error("Control transport error: {0}")]
    Transport(String),

    /// The identity check did not yield an address
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Change log I/O failure
    #[error("Log write error: {0}")]
    LogWrite(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failures (identity check and geolocation providers)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Daemon stop collaborator failure
    #[error("Daemon control error: {0}")]
    DaemonControl(String),
}

impl Error {
    /// Create a "cookie not found" error
    pub fn cookie_not_found(msg: impl Into<String>) -> Self {
        Self::CookieNotFound(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a signal rejection error
    pub fn signal_rejected(msg: impl Into<String>) -> Self {
        Self::SignalRejected(msg.into())
    }

    /// Create a control transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an identity unavailable error
    pub fn identity_unavailable(msg: impl Into<String>) -> Self {
        Self::IdentityUnavailable(msg.into())
    }

    /// Create a log write error
    pub fn log_write(msg: impl Into<String>) -> Self {
        Self::LogWrite(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a daemon control error
    pub fn daemon_control(msg: impl Into<String>) -> Self {
        Self::DaemonControl(msg.into())
    }
}
