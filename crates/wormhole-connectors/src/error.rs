//! Error types shared by every Wormhole component.
//!
//! - `ConnectorError`: top-level error for adapters, bridges and transports
//! - `SerdeError`: envelope encoding and decoding failures
//! - `SpoolError`: spool file state machine violations

use std::path::PathBuf;

use thiserror::Error;

use crate::spool::state::{SpoolEvent, SpoolFileState};

/// Errors that can occur while relaying messages.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to connect to the external system.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication or authorization error.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Required configuration key is missing.
    #[error("missing required config: {0}")]
    MissingConfig(String),

    /// Error reading data (spool file, broker, HTTP request).
    #[error("read error: {0}")]
    ReadError(String),

    /// Error writing data (spool file, broker, HTTP request).
    #[error("write error: {0}")]
    WriteError(String),

    /// Serialization or deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] SerdeError),

    /// Spool file state machine error.
    #[error("spool error: {0}")]
    Spool(#[from] SpoolError),

    /// Offset commit error.
    #[error("commit error: {0}")]
    CommitError(String),

    /// A consumer session error that the adapter cannot recover from.
    #[error("fatal broker error: {0}")]
    Fatal(String),

    /// The component is not in the expected state.
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// The expected state.
        expected: String,
        /// The actual state.
        actual: String,
    },

    /// Operation timed out.
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// The queue or component has been closed.
    #[error("closed")]
    Closed,

    /// An internal error that doesn't fit other categories.
    #[error("internal error: {0}")]
    Internal(String),

    /// An I/O error from the underlying system.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Returns `true` if the error must end the adapter's `run` loop.
    ///
    /// Fatal errors are propagated to the owner, which is expected to
    /// restart the adapter. Every other class is terminal only for the
    /// unit of work that produced it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConnectorError::Fatal(_)
                | ConnectorError::AuthenticationFailed(_)
                | ConnectorError::ConnectionFailed(_)
                | ConnectorError::ConfigurationError(_)
                | ConnectorError::MissingConfig(_)
        )
    }
}

/// Errors that occur while encoding or decoding wire envelopes.
#[derive(Debug, Error)]
pub enum SerdeError {
    /// JSON parsing or encoding error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Base64 payload could not be decoded.
    #[error("base64 error: {0}")]
    Base64(String),

    /// The input data is malformed.
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

impl From<serde_json::Error> for SerdeError {
    fn from(e: serde_json::Error) -> Self {
        SerdeError::Json(e.to_string())
    }
}

impl From<base64::DecodeError> for SerdeError {
    fn from(e: base64::DecodeError) -> Self {
        SerdeError::Base64(e.to_string())
    }
}

/// Errors raised by the spool file state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpoolError {
    /// The event is not allowed from the current state.
    #[error("invalid spool transition: {event} from {from}")]
    InvalidTransition {
        /// State the file was in.
        from: SpoolFileState,
        /// Event that was applied.
        event: SpoolEvent,
    },

    /// The file name carries neither the Ready nor the Claimed suffix.
    #[error("unrecognized spool file name: {}", .0.display())]
    UnrecognizedName(PathBuf),
}
