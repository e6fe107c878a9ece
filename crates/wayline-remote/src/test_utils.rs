//! Scripted command executor for tests
//!
//! Replies are keyed by the exact command string. Commands without a scripted
//! reply fail the way a missing program would, so fallback chains can be
//! exercised by scripting only the variants that should succeed.

use crate::{CommandExecutor, ExecError, ProcessStatus, RemoteProcess, RemoteTarget, StdinPipe};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

/// Scripted reply to `output()`
#[derive(Debug, Clone)]
pub enum Reply {
    /// Succeed with this standard output
    Output(String),
    /// Fail with this exit code and standard error
    Fail(i32, String),
}

/// How a piped process behaves once its input is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeBehavior {
    /// Drain standard input, then exit with this code
    Exit(i32),
    /// Drain standard input, then never exit
    Hang,
    /// Refuse to start
    FailToStart,
}

#[derive(Debug, Default)]
struct Shared {
    commands: Vec<String>,
    received: Vec<u8>,
    kills: usize,
}

/// Command executor driven by a script of replies
pub struct ScriptedExecutor {
    replies: HashMap<String, Reply>,
    pipe_behavior: PipeBehavior,
    shared: Arc<Mutex<Shared>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    /// Executor where every command fails
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            pipe_behavior: PipeBehavior::Exit(0),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Script a successful reply
    pub fn reply(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.replies.insert(command.into(), Reply::Output(output.into()));
        self
    }

    /// Script a failing reply
    pub fn fail(mut self, command: impl Into<String>, code: i32, stderr: impl Into<String>) -> Self {
        self.replies.insert(command.into(), Reply::Fail(code, stderr.into()));
        self
    }

    /// Set how piped processes behave
    pub fn with_pipe_behavior(mut self, behavior: PipeBehavior) -> Self {
        self.pipe_behavior = behavior;
        self
    }

    /// Every command prepared so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Bytes written to piped processes' standard input
    pub fn received(&self) -> Vec<u8> {
        self.lock().received.clone()
    }

    /// Number of times a process was killed
    pub fn kills(&self) -> usize {
        self.lock().kills
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn command(&self, _target: &RemoteTarget, command: &str) -> Box<dyn RemoteProcess> {
        self.lock().commands.push(command.to_string());
        Box::new(ScriptedProcess {
            reply: self.replies.get(command).cloned(),
            pipe_behavior: self.pipe_behavior,
            shared: self.shared.clone(),
            reader: None,
        })
    }
}

struct ScriptedProcess {
    reply: Option<Reply>,
    pipe_behavior: PipeBehavior,
    shared: Arc<Mutex<Shared>>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl RemoteProcess for ScriptedProcess {
    async fn output(&mut self) -> Result<Bytes, ExecError> {
        match &self.reply {
            Some(Reply::Output(out)) => Ok(Bytes::from(out.clone())),
            Some(Reply::Fail(code, stderr)) => Err(ExecError::CommandFailed {
                code: Some(*code),
                stderr: stderr.clone(),
            }),
            None => Err(ExecError::CommandFailed {
                code: Some(127),
                stderr: "command not found".to_string(),
            }),
        }
    }

    fn start_piped(&mut self) -> Result<StdinPipe, ExecError> {
        if self.pipe_behavior == PipeBehavior::FailToStart {
            return Err(ExecError::Spawn {
                program: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            });
        }

        let (writer, mut reader) = tokio::io::duplex(8 * 1024);
        let shared = self.shared.clone();
        self.reader = Some(tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf).await;
            let mut shared = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            shared.received.extend_from_slice(&buf);
        }));
        Ok(Box::new(writer))
    }

    async fn wait(&mut self) -> Result<ProcessStatus, ExecError> {
        let reader = self.reader.take().ok_or(ExecError::NotStarted)?;
        let _ = reader.await;
        match self.pipe_behavior {
            PipeBehavior::Exit(code) => Ok(ProcessStatus {
                code: Some(code),
                stderr: if code == 0 { String::new() } else { "install failed".to_string() },
            }),
            PipeBehavior::Hang | PipeBehavior::FailToStart => std::future::pending().await,
        }
    }

    async fn kill(&mut self) -> Result<(), ExecError> {
        let mut shared = self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        shared.kills += 1;
        Ok(())
    }
}
