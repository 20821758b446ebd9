//! Centralized error types for rr2opml.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the rr2opml library.
#[derive(Error, Debug)]
pub enum Rr2OpmlError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration is well-formed but unusable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The configuration file is not valid TOML for our schema.
    #[error("Could not parse config '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// The mail server could not be reached.
    #[error("Could not connect to mail server '{host}': {reason}")]
    Connect { host: String, reason: String },

    /// The mail server rejected our credentials or folder.
    #[error("Mail server rejected login for '{user}': {source}")]
    Login { user: String, source: imap::Error },

    /// A mailbox protocol error after login. The watch loop recovers from these.
    #[error("Mailbox protocol error: {0}")]
    Protocol(#[from] imap::Error),

    /// The story database failed.
    #[error("Story store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A link could not be resolved over HTTP.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The outline document could not be rendered.
    #[error("Could not render outline: {0}")]
    Outline(String),
}

/// Convenience alias for `Result<T, Rr2OpmlError>`.
pub type Result<T> = std::result::Result<T, Rr2OpmlError>;

impl Rr2OpmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the watch loop should swallow this error and re-arm.
    ///
    /// Only protocol faults on a live session qualify. Everything else either
    /// aborts startup, ends the watch (see [`is_disconnect`](Self::is_disconnect)),
    /// or skips the current cycle's work.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(_)) && !self.is_disconnect()
    }

    /// Whether the mail session itself is gone (socket or TLS failure).
    ///
    /// Nothing reconnects a session, so the watch loop stops on these.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Protocol(
                imap::Error::ConnectionLost
                    | imap::Error::Io(_)
                    | imap::Error::Tls(_)
                    | imap::Error::TlsHandshake(_)
            )
        )
    }
}
