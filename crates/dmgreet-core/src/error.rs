//! Error types for dmgreet.

use thiserror::Error;

/// Main error type for dmgreet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or field during encoding/decoding.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// Protocol violation (unexpected message, bad version).
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The daemon closed its end of the pipe.
    #[error("connection closed by daemon")]
    ConnectionClosed,

    /// A required environment variable is missing or unparseable.
    #[error("environment variable {variable} missing or invalid")]
    Env { variable: &'static str },

    /// Configuration could not be read; callers fall back to defaults.
    #[error("config error: {message}")]
    Config { message: String },
}

impl Error {
    /// Returns true if this error means the connection to the daemon is
    /// unusable and the embedding application should shut down.
    ///
    /// The daemon is the authority on channel lifetime, so a broken pipe
    /// is terminal: there is no reconnect path.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::ConnectionClosed | Error::Env { .. }
        )
    }
}

/// Convenience result type for dmgreet operations.
pub type Result<T> = std::result::Result<T, Error>;
