//! Error types for the webtunnel client

use thiserror::Error;

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Upgrade error: {0}")]
    Upgrade(String),

    #[error("Accept error: {source}")]
    Accept {
        transient: bool,
        #[source]
        source: std::io::Error,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Environment error: {0}")]
    Env(String),

    #[error("No supported managed transport version")]
    Version,
}

impl Error {
    /// Short stable label for diagnostics and rejection reasons
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Dial { .. } => "dial",
            Error::Handshake(_) => "handshake",
            Error::Upgrade(_) => "upgrade",
            Error::Accept { .. } => "accept",
            Error::Protocol(_) => "protocol",
            Error::Env(_) => "env",
            Error::Version => "version",
        }
    }

    /// Whether an accept error can be retried by the accept loop
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Accept { transient: true, .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
