//! # Wayline CLI
//!
//! Argument parsing and command implementations for the `wayline` binary.

#![warn(missing_docs)]

/// Command-line arguments
pub mod args;

/// Command implementations
pub mod commands;

pub use args::{Cli, Command};
