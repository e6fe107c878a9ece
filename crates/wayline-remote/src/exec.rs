//! Command execution port and its subprocess implementation

use crate::{ExecError, RemoteTarget, TargetKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Writable end of a remote process's standard input
pub type StdinPipe = Box<dyn AsyncWrite + Send + Unpin>;

/// Turns a command string into a runnable process on a target.
///
/// Command strings are built by the caller and must be run as given, without
/// re-parsing.
pub trait CommandExecutor: Send + Sync {
    /// Prepare `command` to run on `target`; nothing is spawned yet
    fn command(&self, target: &RemoteTarget, command: &str) -> Box<dyn RemoteProcess>;
}

/// Handle to one prepared or running remote process
#[async_trait]
pub trait RemoteProcess: Send {
    /// Run to completion and return standard output.
    ///
    /// A non-zero exit is reported as [`ExecError::CommandFailed`].
    async fn output(&mut self) -> Result<Bytes, ExecError>;

    /// Start the process with standard input piped and return the pipe
    fn start_piped(&mut self) -> Result<StdinPipe, ExecError>;

    /// Wait for a started process to exit
    async fn wait(&mut self) -> Result<ProcessStatus, ExecError>;

    /// Terminate a started process
    async fn kill(&mut self) -> Result<(), ExecError>;
}

/// Exit information for a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessStatus {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessStatus {
    /// Status for a clean exit
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            stderr: String::new(),
        }
    }

    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run `command` on `target` and capture its output, giving up when `cancel`
/// fires.
pub async fn run_command(
    executor: &dyn CommandExecutor,
    target: &RemoteTarget,
    command: &str,
    cancel: &CancellationToken,
) -> Result<Bytes, ExecError> {
    if cancel.is_cancelled() {
        return Err(ExecError::Cancelled);
    }
    let mut process = executor.command(target, command);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExecError::Cancelled),
        result = process.output() => result,
    }
}

/// Executor that spawns local subprocesses: `ssh`, `wsl.exe`, or a local shell
#[derive(Debug, Clone, Default)]
pub struct SubprocessExecutor {
    /// Override for the `ssh` program
    ssh_program: Option<String>,
    /// Override for the `wsl.exe` program
    wsl_program: Option<String>,
}

impl SubprocessExecutor {
    /// Create an executor using the programs found on `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific `ssh` binary
    pub fn with_ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = Some(program.into());
        self
    }

    /// Use a specific `wsl.exe` binary
    pub fn with_wsl_program(mut self, program: impl Into<String>) -> Self {
        self.wsl_program = Some(program.into());
        self
    }

    /// Build the local command line that runs `command` on `target`
    pub fn build(&self, target: &RemoteTarget, command: &str) -> (String, Vec<String>) {
        match target.kind() {
            TargetKind::Ssh(config) => {
                let program = self.ssh_program.clone().unwrap_or_else(|| "ssh".to_string());
                let mut args = config.ssh_args();
                args.push(command.to_string());
                (program, args)
            }
            TargetKind::Wsl { distro } => {
                let program = self.wsl_program.clone().unwrap_or_else(|| "wsl.exe".to_string());
                let args = vec![
                    "-d".to_string(),
                    distro.clone(),
                    "--".to_string(),
                    command.to_string(),
                ];
                (program, args)
            }
            TargetKind::Local if cfg!(windows) => {
                ("cmd".to_string(), vec!["/C".to_string(), command.to_string()])
            }
            TargetKind::Local => {
                ("sh".to_string(), vec!["-c".to_string(), command.to_string()])
            }
        }
    }
}

impl CommandExecutor for SubprocessExecutor {
    fn command(&self, target: &RemoteTarget, command: &str) -> Box<dyn RemoteProcess> {
        let (program, args) = self.build(target, command);
        debug!("Prepared command on {}: {}", target, command);
        Box::new(SubprocessProcess::new(program, args))
    }
}

/// A `tokio::process` child driven through the [`RemoteProcess`] port
pub struct SubprocessProcess {
    /// Program being run
    program: String,
    /// Prepared command
    command: Command,
    /// Running child, once started
    child: Option<Child>,
    /// Collects standard error while the child runs
    stderr_task: Option<JoinHandle<String>>,
}

impl SubprocessProcess {
    fn new(program: String, args: Vec<String>) -> Self {
        let mut command = Command::new(&program);
        command.args(&args).kill_on_drop(true);
        Self {
            program,
            command,
            child: None,
            stderr_task: None,
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> ExecError {
        ExecError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl RemoteProcess for SubprocessProcess {
    async fn output(&mut self) -> Result<Bytes, ExecError> {
        if self.child.is_some() {
            return Err(ExecError::AlreadyStarted);
        }

        let output = match self.command.stdin(Stdio::null()).output().await {
            Ok(output) => output,
            Err(e) => return Err(self.spawn_error(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExecError::CommandFailed {
                code: output.status.code(),
                stderr,
            });
        }

        Ok(Bytes::from(output.stdout))
    }

    fn start_piped(&mut self) -> Result<StdinPipe, ExecError> {
        if self.child.is_some() {
            return Err(ExecError::AlreadyStarted);
        }

        let spawned = self
            .command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return Err(self.spawn_error(e)),
        };

        let stdin = child.stdin.take().ok_or(ExecError::StdinUnavailable)?;

        if let Some(mut stderr) = child.stderr.take() {
            self.stderr_task = Some(tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("Failed to read stderr: {}", e);
                }
                String::from_utf8_lossy(&buf).trim().to_string()
            }));
        }

        self.child = Some(child);
        Ok(Box::new(stdin))
    }

    async fn wait(&mut self) -> Result<ProcessStatus, ExecError> {
        let child = self.child.as_mut().ok_or(ExecError::NotStarted)?;
        let status = child.wait().await?;

        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        debug!("{} exited with status: {}", self.program, status);
        Ok(ProcessStatus {
            code: status.code(),
            stderr,
        })
    }

    async fn kill(&mut self) -> Result<(), ExecError> {
        let child = self.child.as_mut().ok_or(ExecError::NotStarted)?;
        if let Err(e) = child.kill().await {
            warn!("Failed to kill {}: {}", self.program, e);
            return Err(e.into());
        }
        Ok(())
    }
}
