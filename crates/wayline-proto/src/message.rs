//! Tagged call results and remote error details

use crate::CallError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One item delivered to the consumer of a call.
///
/// Exactly one of a decoded response or an error; the enum makes "both" and
/// "neither" unrepresentable.
#[derive(Debug, Clone)]
pub enum ResponseOrError<T> {
    /// Successfully decoded response
    Response(T),
    /// Error terminating the exchange
    Error(CallError),
}

impl<T> ResponseOrError<T> {
    /// Whether this item carries a response
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Whether this item carries an error
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrow the response, if any
    pub fn response(&self) -> Option<&T> {
        match self {
            Self::Response(resp) => Some(resp),
            Self::Error(_) => None,
        }
    }

    /// Borrow the error, if any
    pub fn error(&self) -> Option<&CallError> {
        match self {
            Self::Response(_) => None,
            Self::Error(err) => Some(err),
        }
    }

    /// Convert into a `Result`
    pub fn into_result(self) -> Result<T, CallError> {
        match self {
            Self::Response(resp) => Ok(resp),
            Self::Error(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, CallError>> for ResponseOrError<T> {
    fn from(result: Result<T, CallError>) -> Self {
        match result {
            Ok(resp) => Self::Response(resp),
            Err(err) => Self::Error(err),
        }
    }
}

/// Error reported by the remote side of an exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context data
    pub context: HashMap<String, String>,
}

/// Error codes reported by the remote side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Invalid request format
    InvalidRequest,
    /// No handler for the command
    UnknownCommand,
    /// Permission denied
    PermissionDenied,
    /// Timeout occurred
    Timeout,
    /// Internal server error
    InternalError,
    /// Unsupported operation
    Unsupported,
}

impl ErrorDetails {
    /// Create a new error details
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: HashMap::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}
