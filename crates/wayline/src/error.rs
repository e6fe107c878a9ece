//! Error types for the Wayline library

use thiserror::Error;
use wayline_proto::CallError;
use wayline_remote::{ExecError, InstallError, ProbeError};

/// Main error type for Wayline operations
#[derive(Debug, Error)]
pub enum WaylineError {
    /// Call layer errors
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    /// Remote command errors
    #[error("Remote command error: {0}")]
    Exec(#[from] ExecError),

    /// Environment probe errors
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Install errors
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WaylineError {
    /// Whether the error came from a cancelled operation
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Call(CallError::Cancelled)
                | Self::Exec(ExecError::Cancelled)
                | Self::Probe(ProbeError::Cancelled)
                | Self::Install(InstallError::Cancelled)
        )
    }
}
