//! Error types for remote execution, probing and installation

use crate::ShellDialect;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a command execution port
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be spawned
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// I/O error while talking to the process
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Remote command exited unsuccessfully
    #[error("Remote command failed with exit code {}: {stderr}", format_code(.code))]
    CommandFailed {
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The process was already started
    #[error("Process already started")]
    AlreadyStarted,

    /// The process was never started
    #[error("Process not started")]
    NotStarted,

    /// Standard input was not piped
    #[error("Standard input is not available")]
    StdinUnavailable,

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

fn format_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (killed by signal)".to_string(),
    }
}

/// One failed variant of a fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeAttempt {
    /// Dialect the variant was written for
    pub dialect: ShellDialect,
    /// Command that was run
    pub command: String,
    /// Why the variant was rejected
    pub error: String,
}

/// Errors raised by environment probes
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// Every dialect variant for a fact failed
    #[error("unable to determine {fact}: {{{}}}", format_attempts(.attempts))]
    Exhausted {
        /// The fact being probed
        fact: &'static str,
        /// Each variant's failure, in the order tried
        attempts: Vec<ProbeAttempt>,
    },

    /// The probing session was cancelled
    #[error("Probe cancelled")]
    Cancelled,
}

fn format_attempts(attempts: &[ProbeAttempt]) -> String {
    attempts
        .iter()
        .map(|attempt| format!("{}: {}", attempt.dialect.label(), attempt.error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while installing a file on the remote target
#[derive(Debug, Error)]
pub enum InstallError {
    /// The local source file could not be opened
    #[error("cannot open local file {} to send to host: {source}", .path.display())]
    SourceOpen {
        /// Local path
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// The remote install process could not be started
    #[error("failed to start remote install: {0}")]
    Spawn(#[source] ExecError),

    /// Copying bytes into the remote process failed
    #[error("failed to stream file to remote after {copied} bytes: {source}")]
    Copy {
        /// Bytes written before the failure, when known
        copied: u64,
        /// Underlying error
        source: io::Error,
    },

    /// The remote side did not confirm a complete install
    #[error("remote install could not be verified: {reason}")]
    Unverified {
        /// What went wrong
        reason: String,
    },

    /// The install was cancelled
    #[error("install cancelled")]
    Cancelled,
}
