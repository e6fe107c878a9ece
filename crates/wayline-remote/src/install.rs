//! Streaming a local file onto a target through a shell pipeline

use crate::dialect::{quote_posix, quote_posix_path};
use crate::exec::ProcessStatus;
use crate::{InstallError, RemoteProbe, RemoteProcess, StdinPipe};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Steps run on the target; the file arrives on standard input. Each step
/// only runs if the previous one succeeded, so the exit status reflects the
/// whole install.
const INSTALL_SCRIPT: &str =
    "mkdir -p {installDir} && cat > {tempPath} && mv {tempPath} {installPath} && chmod a+x {installPath}";

/// Which shell runs the install script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallTemplate {
    /// Wrapped in `bash -c` so the target's login shell does not matter
    Bash,
    /// Run directly by the target's default shell
    Default,
}

impl InstallTemplate {
    /// Pick the template for a target with or without bash
    pub fn for_bash(has_bash: bool) -> Self {
        if has_bash {
            Self::Bash
        } else {
            Self::Default
        }
    }

    /// Render the script with `vars` substituted
    pub fn render(&self, vars: &InstallVars) -> String {
        let script = substitute(INSTALL_SCRIPT, &vars.quoted());
        match self {
            Self::Bash => format!("bash -c {}", quote_posix(&script)),
            Self::Default => script,
        }
    }
}

/// Paths substituted into an install script, unquoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallVars {
    /// Directory created before copying
    pub install_dir: String,
    /// Where the bytes are written first
    pub temp_path: String,
    /// Final location of the file
    pub install_path: String,
}

impl InstallVars {
    /// Derive the variables for a destination path
    pub fn for_destination(dest: &str, temp_suffix: &str) -> Self {
        Self {
            install_dir: parent_dir(dest),
            temp_path: format!("{}{}", dest, temp_suffix),
            install_path: dest.to_string(),
        }
    }

    fn quoted(&self) -> HashMap<&'static str, String> {
        HashMap::from([
            ("installDir", quote_posix_path(&self.install_dir)),
            ("tempPath", quote_posix_path(&self.temp_path)),
            ("installPath", quote_posix_path(&self.install_path)),
        ])
    }
}

/// Parent directory of a destination, with `\` normalized to `/`
fn parent_dir(dest: &str) -> String {
    let normalized = dest.replace('\\', "/");
    match normalized.rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((dir, _)) => dir.to_string(),
        None => ".".to_string(),
    }
}

/// Replace `{name}` markers in one pass so substituted text is never rescanned.
/// Unknown markers are left as they are.
fn substitute(template: &str, vars: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => match vars.get(&after[..end]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Installer tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerConfig {
    /// Suffix of the temporary file written before the final rename
    pub temp_suffix: String,
    /// How long the remote side may take to finish after the copy starts
    pub completion_timeout: Duration,
    /// Read buffer size for the local file
    pub copy_buffer_size: usize,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            temp_suffix: ".temp".to_string(),
            completion_timeout: Duration::from_secs(60),
            copy_buffer_size: 64 * 1024,
        }
    }
}

impl InstallerConfig {
    /// Set the completion timeout
    pub fn with_completion_timeout(mut self, completion_timeout: Duration) -> Self {
        self.completion_timeout = completion_timeout;
        self
    }

    /// Set the temporary file suffix
    pub fn with_temp_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_suffix = suffix.into();
        self
    }
}

/// Outcome of a verified install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Final path on the target
    pub destination: String,
    /// Bytes written to the remote process
    pub bytes_copied: u64,
    /// Exit code of the remote script
    pub exit_code: i32,
}

/// Copies local files onto the target of a probing session
pub struct Installer<'a> {
    probe: &'a RemoteProbe<'a>,
    config: InstallerConfig,
}

impl<'a> Installer<'a> {
    /// Create an installer sharing the probe's executor, target and
    /// cancellation token
    pub fn new(probe: &'a RemoteProbe<'a>) -> Self {
        Self {
            probe,
            config: InstallerConfig::default(),
        }
    }

    /// Use a custom configuration
    pub fn with_config(mut self, config: InstallerConfig) -> Self {
        self.config = config;
        self
    }

    /// The installer's configuration
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Build the install command for `dest`, choosing the template from the
    /// target's bash availability
    pub async fn render_script(&self, dest: &str) -> String {
        let has_bash = self.probe.has_bash().await;
        if !has_bash {
            info!("bash is not installed on {}; using the default shell", self.probe.target());
        }
        let vars = InstallVars::for_destination(dest, &self.config.temp_suffix);
        InstallTemplate::for_bash(has_bash).render(&vars)
    }

    /// Stream `source` to `dest` on the target and wait for the remote side
    /// to confirm it
    pub async fn install(
        &self,
        source: impl AsRef<Path>,
        dest: &str,
    ) -> Result<InstallReport, InstallError> {
        let source = source.as_ref();
        let cancel = self.probe.cancellation();
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let script = self.render_script(dest).await;
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }

        let file = File::open(source).await.map_err(|source_err| InstallError::SourceOpen {
            path: source.to_path_buf(),
            source: source_err,
        })?;

        info!("Installing {} to {} on {}", source.display(), dest, self.probe.target());
        debug!("Install script: {}", script);

        let mut process = self.probe.executor().command(self.probe.target(), &script);
        let stdin = process.start_piped().map_err(InstallError::Spawn)?;
        let mut copy = tokio::spawn(copy_to_stdin(file, stdin, self.config.copy_buffer_size));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InstallError::Cancelled),
            finished = timeout(self.config.completion_timeout, finish(process.as_mut(), &mut copy)) => {
                match finished {
                    Ok(result) => result,
                    Err(_) => Err(InstallError::Unverified {
                        reason: format!(
                            "remote did not finish within {:?}",
                            self.config.completion_timeout
                        ),
                    }),
                }
            }
        };

        match outcome {
            Ok((bytes_copied, exit_code)) => {
                info!("Installed {} ({} bytes) on {}", dest, bytes_copied, self.probe.target());
                Ok(InstallReport {
                    destination: dest.to_string(),
                    bytes_copied,
                    exit_code,
                })
            }
            Err(e) => {
                warn!("Install of {} on {} failed: {}", dest, self.probe.target(), e);
                copy.abort();
                if let Err(kill_err) = process.kill().await {
                    debug!("Failed to kill install process: {}", kill_err);
                }
                Err(e)
            }
        }
    }
}

/// Copy the file into the pipe, then close it so the remote `cat` sees EOF
async fn copy_to_stdin(
    mut file: File,
    mut stdin: StdinPipe,
    buffer_size: usize,
) -> Result<u64, InstallError> {
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|source| InstallError::Copy { copied, source })?;
        if n == 0 {
            break;
        }
        stdin
            .write_all(&buf[..n])
            .await
            .map_err(|source| InstallError::Copy { copied, source })?;
        copied += n as u64;
    }

    stdin
        .shutdown()
        .await
        .map_err(|source| InstallError::Copy { copied, source })?;
    debug!("Copied {} bytes to remote stdin", copied);
    Ok(copied)
}

/// Wait for the copy, then for the remote process to exit on its own.
///
/// A failed remote step usually breaks the pipe too, so the exit status is
/// checked before the copy result.
async fn finish(
    process: &mut dyn RemoteProcess,
    copy: &mut JoinHandle<Result<u64, InstallError>>,
) -> Result<(u64, i32), InstallError> {
    let copied = match copy.await {
        Ok(result) => result,
        Err(join_err) => Err(InstallError::Copy {
            copied: 0,
            source: std::io::Error::new(std::io::ErrorKind::Other, join_err.to_string()),
        }),
    };
    if let Err(e) = &copied {
        debug!("Copy to remote stdin failed: {}", e);
    }

    let status = process.wait().await.map_err(|e| InstallError::Unverified {
        reason: e.to_string(),
    })?;
    let code = check_status(&status)?;
    copied.map(|copied| (copied, code))
}

fn check_status(status: &ProcessStatus) -> Result<i32, InstallError> {
    match status.code {
        Some(0) => Ok(0),
        Some(code) => Err(InstallError::Unverified {
            reason: if status.stderr.is_empty() {
                format!("remote exited with code {}", code)
            } else {
                format!("remote exited with code {}: {}", code, status.stderr)
            },
        }),
        None => Err(InstallError::Unverified {
            reason: "remote was terminated by a signal".to_string(),
        }),
    }
}
