//! The communication error taxonomy.

use thiserror::Error;

/// Result type alias for printer communication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the printer communication layer.
///
/// Every failure is one of a small closed set of kinds so a caller can
/// map connection problems, credential problems, and transfer problems
/// to distinct user-facing statuses.
#[derive(Debug, Error)]
pub enum Error {
    /// The printer could not be reached, or the transport broke mid-operation.
    #[error("connection error: {0}")]
    Connection(String),

    /// The printer rejected every login strategy we are willing to try.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// The local file is missing or not a regular file, or the printer
    /// rejected the transfer command itself.
    #[error("file transfer error: {0}")]
    FileTransfer(String),

    /// The MQTT broker refused the connection or the publish, or an
    /// acknowledgment never arrived inside the wait budget.
    #[error("control error: {0}")]
    Control(String),

    /// Anything the other kinds do not cover, e.g. a payload that would
    /// not serialize.
    #[error("communication error: {0}")]
    Communication(String),
}
