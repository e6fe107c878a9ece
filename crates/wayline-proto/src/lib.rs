//! # Wayline Protocol
//!
//! Call options, schema-agnostic envelopes, tagged call results and the RPC
//! transport port that the Wayline dispatcher is built on.

#![warn(missing_docs)]

/// Schema-agnostic payload envelope
pub mod envelope;

/// Per-call options
pub mod options;

/// Tagged call results and remote error details
pub mod message;

/// RPC transport port
pub mod transport;

/// Error types for calls and transports
pub mod error;

pub use envelope::Envelope;
pub use options::CallOptions;
pub use message::{ErrorCode, ErrorDetails, ResponseOrError};
pub use transport::{ResponseSource, RpcTransport};
pub use error::{CallError, TransportError};
