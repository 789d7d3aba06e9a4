//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the controller and its subcommands.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// IO error.
    Io(std::io::Error),
    /// The export server could not be reached.
    Connection(String),
    /// The server answered with something the controller does not understand.
    Protocol(String),
    /// Request timed out.
    Timeout(String),
    /// Audio device or sample error.
    Audio(String),
    /// The HTTP server failed to start or stopped with an error.
    Server(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Timeout(msg) => write!(f, "timeout: {}", msg),
            Self::Audio(msg) => write!(f, "audio error: {}", msg),
            Self::Server(msg) => write!(f, "server error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Protocol(err.to_string())
        }
    }
}

impl From<slowjog_protocol::ProtocolError> for ClientError {
    fn from(err: slowjog_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<slowjog_core::MetronomeError> for ClientError {
    fn from(err: slowjog_core::MetronomeError) -> Self {
        Self::Audio(err.to_string())
    }
}

impl From<slowjog_server::ServerError> for ClientError {
    fn from(err: slowjog_server::ServerError) -> Self {
        Self::Server(err.to_string())
    }
}

impl From<slowjog_providers::ProviderError> for ClientError {
    fn from(err: slowjog_providers::ProviderError) -> Self {
        Self::Config(err.to_string())
    }
}
