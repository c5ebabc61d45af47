//! Error types for the log store.

use thiserror::Error;

use crate::model::StreamId;

/// Errors surfaced to callers of the log store.
///
/// Out-of-range reads and references to unregistered indexes are not
/// errors: they are absorbed into `false` / empty results so that inserts
/// and filters stay total over arbitrary token and query data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Every index id in the bit-encoded id space has been handed out.
    #[error("index capacity exhausted: {registered} indexes already registered")]
    CapacityExhausted { registered: usize },

    /// The stream id was never returned by `add_stream`.
    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    /// The supplied configuration could not be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for log store operations.
pub type Result<T> = std::result::Result<T, Error>;
