//! # Wayline
//!
//! Typed calls over a pluggable RPC transport, plus probing and installing a
//! helper binary on remote targets whose shell is not known in advance.
//!
//! The [`Dispatcher`] turns unary and streaming transport exchanges into typed
//! results and [`ResponseStream`]s. [`HelperBootstrap`] drives
//! [`remote::RemoteProbe`] and [`remote::Installer`] to keep a target's
//! helper binary up to date.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use wayline_proto as proto;
pub use wayline_remote as remote;

/// Error types for the Wayline library
pub mod error;

/// Typed unary and streaming calls
pub mod dispatcher;

/// Push-style response streams
pub mod stream;

/// Helper binary bootstrap
pub mod bootstrap;

/// Testing utilities
pub mod test_utils;

pub use bootstrap::{BootstrapOutcome, HelperBootstrap, HelperConfig};
pub use dispatcher::Dispatcher;
pub use error::WaylineError;
pub use stream::ResponseStream;

/// Result type alias for Wayline operations
pub type Result<T> = std::result::Result<T, WaylineError>;
