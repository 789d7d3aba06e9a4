//! Protocol error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while building or reading protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Body was not the JSON we expected.
    #[error("malformed JSON body: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An event that ends before it starts.
    #[error("event ends ({end}) before it starts ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A required field was empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}
