//! # Wayline Remote
//!
//! Remote environment probing and helper installation over a pluggable
//! command execution port.

#![warn(missing_docs)]

/// Error types
pub mod error;

/// Shell dialects and quoting
pub mod dialect;

/// Remote target handles
pub mod target;

/// Command execution port
pub mod exec;

/// Environment probes with dialect fallback
pub mod probe;

/// File installation over a piped shell command
pub mod install;

/// Testing utilities
pub mod test_utils;

pub use dialect::{classify_dialect, ShellDialect};
pub use error::{ExecError, InstallError, ProbeAttempt, ProbeError};
pub use exec::{
    run_command, CommandExecutor, ProcessStatus, RemoteProcess, StdinPipe, SubprocessExecutor,
};
pub use install::{InstallReport, InstallTemplate, InstallVars, Installer, InstallerConfig};
pub use probe::{ProbeCommand, ProbeConfig, ProbeResult, RemoteProbe};
pub use target::{RemoteTarget, SshConfig, TargetKind};
