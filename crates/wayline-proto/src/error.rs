//! Error types for calls and transports

use crate::ErrorDetails;
use thiserror::Error;

/// Errors raised by an RPC transport implementation
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The transport has been closed
    #[error("Transport closed")]
    Closed,

    /// The exchange exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// The remote side answered with an error
    #[error("Remote error: {0}")]
    Remote(ErrorDetails),

    /// I/O error on the underlying connection
    #[error("I/O error: {0}")]
    Io(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Other(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Errors surfaced by the call layer
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// No transport is bound to the dispatcher
    #[error("No RPC transport bound to dispatcher")]
    TransportUnavailable,

    /// The transport failed to send or receive
    #[error("Send failure: {0}")]
    Send(#[from] TransportError),

    /// The request payload could not be encoded
    #[error("Failed to encode payload: {0}")]
    Encode(String),

    /// The response envelope could not be converted into the target type
    #[error("Failed to decode response into {target}: {message}")]
    Decode {
        /// Name of the target type
        target: &'static str,
        /// Decoder message
        message: String,
    },

    /// A stream ended early because of a transport or decode error
    #[error("Stream terminated after {received} responses: {source}")]
    StreamTerminated {
        /// Responses delivered before the failure
        received: usize,
        /// The failure that ended the stream
        source: Box<CallError>,
    },

    /// The call was cancelled by the caller
    #[error("Call cancelled")]
    Cancelled,
}

impl CallError {
    /// Whether this error comes from a missing transport
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable)
    }

    /// Whether this error is a decode failure, directly or as a stream terminator
    pub fn is_decode(&self) -> bool {
        match self {
            Self::Decode { .. } => true,
            Self::StreamTerminated { source, .. } => source.is_decode(),
            _ => false,
        }
    }
}
