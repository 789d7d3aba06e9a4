//! Server error types.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error (socket, static files, thread spawn).
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The listening socket could not be opened.
    #[error("failed to listen on {addr}: {message}")]
    Bind { addr: SocketAddr, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl ServerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn bind(addr: SocketAddr, message: impl Into<String>) -> Self {
        Self::Bind {
            addr,
            message: message.into(),
        }
    }
}
