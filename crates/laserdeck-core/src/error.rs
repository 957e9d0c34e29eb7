//! Error handling for LaserDeck
//!
//! Provides error types for every channel the client talks to the controller over:
//! - Connection errors (transport, HTTP status, event stream)
//! - Payload errors (state documents that cannot be mirrored)
//! - Command errors (transport or backend rejection)
//! - Upload errors (selection, concurrency, transfer)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Connection error type
///
/// Represents failures of the underlying transport to the controller:
/// unreachable host, timeouts, broken or closed event streams.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Controller could not be reached
    #[error("Controller unreachable at {url}: {reason}")]
    Unreachable {
        /// The URL that was requested.
        url: String,
        /// The reason reported by the transport.
        reason: String,
    },

    /// Request timed out
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The event stream was closed by the controller
    #[error("Event stream closed by controller")]
    StreamClosed,

    /// Reading from the event stream failed
    #[error("Event stream failed: {reason}")]
    StreamFailed {
        /// The reason the stream failed.
        reason: String,
    },

    /// The controller answered the stream request with a non-success status
    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The configured base URL or path is invalid
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// Generic connection error
    #[error("Connection error: {message}")]
    Other {
        /// The error message.
        message: String,
    },
}

/// Errors raised while interpreting a pushed or echoed state document.
///
/// These never escape the parse boundary as crashes; the state channel
/// logs and drops the payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload is not valid JSON
    #[error("Payload is not valid JSON: {reason}")]
    NotJson {
        /// The parser message.
        reason: String,
    },

    /// Payload is JSON but not an object
    #[error("Payload is not a JSON object")]
    NotAnObject,

    /// Backend pushed its not-authorized marker instead of state
    #[error("Controller reports the session is not authorized")]
    Unauthorized,

    /// A known field has the wrong type or an out-of-range value
    #[error("Invalid state payload: {reason}")]
    Invalid {
        /// The reason the payload was rejected.
        reason: String,
    },

    /// Object carries none of the state fields
    #[error("Payload contains no machine state fields")]
    NoKnownFields,
}

/// Command error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Request never got an answer
    #[error(transparent)]
    Transport(#[from] ConnectionError),

    /// Controller answered with a non-success status
    #[error("Command rejected ({status}): {reason}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The backend-provided reason, or a generic message.
        reason: String,
    },
}

/// Upload error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// `start_upload` was called without a file
    #[error("No file selected")]
    NoFileSelected,

    /// Another upload is still running
    #[error("An upload is already in progress")]
    AlreadyInProgress,

    /// Reading the local file failed
    #[error("Failed to read upload source: {reason}")]
    Source {
        /// The I/O error message.
        reason: String,
    },

    /// Transfer failed in transit
    #[error(transparent)]
    Transport(#[from] ConnectionError),

    /// Controller refused the file
    #[error("Upload rejected ({status}): {reason}")]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// Why the controller refused the file.
        reason: String,
    },
}

/// Main error type for LaserDeck
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Payload error
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Upload error
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = CommandError::Rejected {
            status: 409,
            reason: "printer busy".to_string(),
        };
        assert_eq!(err.to_string(), "Command rejected (409): printer busy");

        let err: CommandError = ConnectionError::Timeout { timeout_ms: 5000 }.into();
        assert_eq!(err.to_string(), "Request timed out after 5000ms");
    }

    #[test]
    fn test_unified_error_is_transparent() {
        let err: Error = UploadError::Rejected {
            status: 413,
            reason: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Upload rejected (413): disk full");

        let err: Error = CommandError::Transport(ConnectionError::StreamClosed).into();
        assert_eq!(err.to_string(), "Event stream closed by controller");
    }
}
