//! Remote environment probing
//!
//! The shell a target runs commands with is not known in advance, so every
//! fact is probed through an ordered chain of dialect-specific variants:
//! POSIX syntax first, then Windows `cmd`, then PowerShell. A variant is
//! rejected when the command fails, when it echoes its own variable name back
//! unexpanded, or (for facts that must have a value) when it prints nothing.

use crate::dialect::{classify_dialect, quote_program};
use crate::exec::run_command;
use crate::{CommandExecutor, ExecError, ProbeAttempt, ProbeError, RemoteTarget, ShellDialect};
use std::borrow::Cow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One dialect-specific variant of a probe
#[derive(Debug, Clone)]
pub struct ProbeCommand {
    /// Dialect the command is written for
    pub dialect: ShellDialect,
    /// Command to run
    pub command: Cow<'static, str>,
    /// Outputs meaning the variable was echoed back unexpanded
    pub placeholders: &'static [&'static str],
    /// Reject empty output
    pub require_output: bool,
    /// Turns accepted raw output into the fact's value
    pub normalize: fn(&str) -> String,
}

impl ProbeCommand {
    const fn fixed(
        dialect: ShellDialect,
        command: &'static str,
        placeholders: &'static [&'static str],
        normalize: fn(&str) -> String,
    ) -> Self {
        Self {
            dialect,
            command: Cow::Borrowed(command),
            placeholders,
            require_output: true,
            normalize,
        }
    }
}

/// Operating system probes
pub static OS_PROBES: [ProbeCommand; 3] = [
    ProbeCommand::fixed(ShellDialect::Posix, "uname -s", &[], normalize_os_uname),
    ProbeCommand::fixed(ShellDialect::WindowsCmd, "echo %OS%", &["%OS%"], normalize_os_windows),
    ProbeCommand::fixed(ShellDialect::PowerShell, "echo $env:OS", &["$env:OS"], normalize_os_windows),
];

/// CPU architecture probes
pub static ARCH_PROBES: [ProbeCommand; 3] = [
    ProbeCommand::fixed(ShellDialect::Posix, "uname -m", &[], normalize_architecture),
    ProbeCommand::fixed(
        ShellDialect::WindowsCmd,
        "echo %PROCESSOR_ARCHITECTURE%",
        &["%PROCESSOR_ARCHITECTURE%"],
        normalize_lower,
    ),
    ProbeCommand::fixed(
        ShellDialect::PowerShell,
        "echo $env:PROCESSOR_ARCHITECTURE",
        &["$env:PROCESSOR_ARCHITECTURE"],
        normalize_lower,
    ),
];

/// Home directory probes; `$HOME` expands in PowerShell too
pub static HOME_PROBES: [ProbeCommand; 2] = [
    ProbeCommand::fixed(ShellDialect::Posix, r#"echo "$HOME""#, &[r#""$HOME""#, "$HOME"], normalize_trim),
    ProbeCommand::fixed(ShellDialect::WindowsCmd, "echo %userprofile%", &["%userprofile%"], normalize_trim),
];

/// Bash availability probes; no PowerShell variant
pub static BASH_PROBES: [ProbeCommand; 2] = [
    ProbeCommand::fixed(ShellDialect::Posix, "which bash", &[], normalize_first_line),
    ProbeCommand::fixed(ShellDialect::WindowsCmd, "where.exe bash", &[], normalize_first_line),
];

/// Lowercase and trim `uname -s` output
pub fn normalize_os_uname(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lowercase, trim and cut Windows `OS` values at the first `_`
/// (`Windows_NT` becomes `windows`)
pub fn normalize_os_windows(raw: &str) -> String {
    let formatted = raw.trim().to_lowercase();
    match formatted.split_once('_') {
        Some((first, _)) => first.to_string(),
        None => formatted,
    }
}

/// Lowercase and trim an architecture name, mapping `x86_64` to `x64`
pub fn normalize_architecture(raw: &str) -> String {
    let formatted = raw.trim().to_lowercase();
    if formatted == "x86_64" {
        return "x64".to_string();
    }
    formatted
}

fn normalize_lower(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn normalize_trim(raw: &str) -> String {
    raw.trim().to_string()
}

fn normalize_first_line(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Helper binary naming and fallback paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Helper executable name looked up on `PATH`
    pub helper_name: String,
    /// Path assumed when every lookup fails
    pub default_helper_path: String,
    /// Helper location relative to `%userprofile%` on Windows targets
    pub windows_helper_path: String,
    /// Shell assumed when the helper cannot report one
    pub fallback_shell: String,
    /// Home directory assumed when every lookup fails
    pub fallback_home: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            helper_name: "wsh".to_string(),
            default_helper_path: "~/.waveterm/bin/wsh".to_string(),
            windows_helper_path: r"\.waveterm\bin\wsh.exe".to_string(),
            fallback_shell: "/bin/bash".to_string(),
            fallback_home: "~".to_string(),
        }
    }
}

impl ProbeConfig {
    /// Set the helper name
    pub fn with_helper_name(mut self, name: impl Into<String>) -> Self {
        self.helper_name = name.into();
        self
    }

    /// Set the default helper path
    pub fn with_default_helper_path(mut self, path: impl Into<String>) -> Self {
        self.default_helper_path = path.into();
        self
    }

    /// Set the Windows helper path relative to `%userprofile%`
    pub fn with_windows_helper_path(mut self, path: impl Into<String>) -> Self {
        self.windows_helper_path = path.into();
        self
    }

    /// Helper lookup variants in priority order
    pub fn helper_path_probes(&self) -> Vec<ProbeCommand> {
        vec![
            ProbeCommand {
                dialect: ShellDialect::Posix,
                command: Cow::Owned(format!("which {}", self.helper_name)),
                placeholders: &[],
                require_output: true,
                normalize: normalize_first_line,
            },
            ProbeCommand {
                dialect: ShellDialect::WindowsCmd,
                command: Cow::Owned(format!("where.exe {}", self.helper_name)),
                placeholders: &[],
                require_output: true,
                normalize: normalize_first_line,
            },
            // cmd needs an absolute path with backslashes; the trailing `echo
            // none` is what every other shell ends up running
            ProbeCommand {
                dialect: ShellDialect::WindowsCmd,
                command: Cow::Owned(format!(
                    "(dir 2>&1 *``|echo %userprofile%{});&<# rem #>echo none",
                    self.windows_helper_path
                )),
                placeholders: &["none"],
                require_output: true,
                normalize: normalize_trim,
            },
        ]
    }
}

/// Everything learned about a target in one probing session
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Helper binary path (possibly the configured default)
    pub helper_path: String,
    /// Shell reported by the helper (possibly the fallback)
    pub shell: String,
    /// Dialect of `shell`
    pub dialect: ShellDialect,
    /// Whether bash is on the target's `PATH`
    pub has_bash: bool,
    /// Normalized OS name
    pub os: Result<String, ProbeError>,
    /// Normalized architecture
    pub arch: Result<String, ProbeError>,
    /// Home directory (possibly `~`)
    pub home_dir: String,
}

/// Probing session against one target
pub struct RemoteProbe<'a> {
    /// Command execution port
    executor: &'a dyn CommandExecutor,
    /// Target being probed
    target: &'a RemoteTarget,
    /// Helper naming and fallbacks
    config: ProbeConfig,
    /// Cancels every command of the session
    cancel: CancellationToken,
}

impl<'a> RemoteProbe<'a> {
    /// Create a probing session
    pub fn new(executor: &'a dyn CommandExecutor, target: &'a RemoteTarget) -> Self {
        Self {
            executor,
            target,
            config: ProbeConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a custom configuration
    pub fn with_config(mut self, config: ProbeConfig) -> Self {
        self.config = config;
        self
    }

    /// Tie the session to a cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The session's configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// The probed target
    pub fn target(&self) -> &'a RemoteTarget {
        self.target
    }

    /// The command execution port
    pub fn executor(&self) -> &'a dyn CommandExecutor {
        self.executor
    }

    /// The session's cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    async fn run(&self, command: &str) -> Result<String, ExecError> {
        let out = run_command(self.executor, self.target, command, &self.cancel).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Try each variant in order and return the first accepted value
    pub async fn run_chain(
        &self,
        fact: &'static str,
        probes: &[ProbeCommand],
    ) -> Result<String, ProbeError> {
        let mut attempts = Vec::with_capacity(probes.len());

        for probe in probes {
            let rejection = match self.run(&probe.command).await {
                Ok(raw) => {
                    let trimmed = raw.trim();
                    if probe.placeholders.iter().any(|placeholder| *placeholder == trimmed) {
                        format!("variable not expanded: {}", trimmed)
                    } else if probe.require_output && trimmed.is_empty() {
                        "empty output".to_string()
                    } else {
                        let value = (probe.normalize)(&raw);
                        debug!("Probed {} on {} via {}: {}", fact, self.target, probe.dialect, value);
                        return Ok(value);
                    }
                }
                Err(ExecError::Cancelled) => return Err(ProbeError::Cancelled),
                Err(e) => e.to_string(),
            };

            debug!(
                "{} probe `{}` rejected on {}: {}",
                fact, probe.command, self.target, rejection
            );
            attempts.push(ProbeAttempt {
                dialect: probe.dialect,
                command: probe.command.to_string(),
                error: rejection,
            });
        }

        Err(ProbeError::Exhausted { fact, attempts })
    }

    /// Locate the helper binary; never fails, falling back to the configured
    /// default path
    pub async fn helper_path(&self) -> String {
        match self.run_chain("helper path", &self.config.helper_path_probes()).await {
            Ok(path) => path,
            Err(e) => {
                debug!("{}; using default helper path", e);
                self.config.default_helper_path.clone()
            }
        }
    }

    /// Ask the helper which shell the target uses; defaults to the fallback
    /// shell when the helper cannot answer
    pub async fn detect_shell(&self) -> String {
        let helper = self.helper_path().await;
        self.shell_for_helper(&helper).await
    }

    async fn shell_for_helper(&self, helper: &str) -> String {
        let command = format!("{} shell", quote_program(helper));
        info!("Detecting shell on {} using: {}", self.target, command);

        match self.run(&command).await {
            Ok(out) if !out.trim().is_empty() => {
                let shell = out.trim().to_string();
                debug!("Detected shell on {}: {}", self.target, shell);
                shell
            }
            Ok(_) => {
                warn!("Helper reported no shell; defaulting to {}", self.config.fallback_shell);
                self.config.fallback_shell.clone()
            }
            Err(e) => {
                warn!("Unable to determine shell, defaulting to {}: {}", self.config.fallback_shell, e);
                self.config.fallback_shell.clone()
            }
        }
    }

    /// Dialect of the shell reported by [`RemoteProbe::detect_shell`]
    pub async fn dialect(&self) -> ShellDialect {
        classify_dialect(&self.detect_shell().await)
    }

    /// Whether bash is installed; requires a successful lookup with output
    pub async fn has_bash(&self) -> bool {
        self.run_chain("bash", &BASH_PROBES).await.is_ok()
    }

    /// Operating system, e.g. `linux`, `darwin` or `windows`
    pub async fn os(&self) -> Result<String, ProbeError> {
        self.run_chain("os", &OS_PROBES).await
    }

    /// CPU architecture, e.g. `x64` or `arm64`
    pub async fn arch(&self) -> Result<String, ProbeError> {
        self.run_chain("architecture", &ARCH_PROBES).await
    }

    /// Home directory; falls back to `~`
    pub async fn home_dir(&self) -> String {
        match self.run_chain("home directory", &HOME_PROBES).await {
            Ok(home) => home,
            Err(e) => {
                debug!("{}; using {}", e, self.config.fallback_home);
                self.config.fallback_home.clone()
            }
        }
    }

    /// Version string reported by the helper
    pub async fn helper_version(&self) -> Result<String, ExecError> {
        let helper = self.helper_path().await;
        let out = self.run(&format!("{} version", quote_program(&helper))).await?;
        Ok(out.trim().to_string())
    }

    /// Have the helper install its shell rc files
    pub async fn install_rc_files(&self) -> Result<(), ExecError> {
        let helper = self.helper_path().await;
        info!("Installing rc files on {} with helper at {}", self.target, helper);
        self.run(&format!("{} rcfiles", quote_program(&helper))).await?;
        Ok(())
    }

    /// Run every probe in turn
    pub async fn probe_all(&self) -> ProbeResult {
        let helper_path = self.helper_path().await;
        let shell = self.shell_for_helper(&helper_path).await;
        let dialect = classify_dialect(&shell);
        let has_bash = self.has_bash().await;
        let os = self.os().await;
        let arch = self.arch().await;
        let home_dir = self.home_dir().await;

        ProbeResult {
            helper_path,
            shell,
            dialect,
            has_bash,
            os,
            arch,
            home_dir,
        }
    }
}

#[cfg(test)]
mod tests;
