//! Remote target handles

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Opaque handle to a remote execution context.
///
/// Owned by the caller and only ever borrowed by probes and installers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Display name
    name: String,
    /// How commands reach the target
    kind: TargetKind,
}

/// How commands reach a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKind {
    /// SSH through the system `ssh` client
    Ssh(SshConfig),
    /// A WSL distribution, through `wsl.exe`
    Wsl {
        /// Distribution name
        distro: String,
    },
    /// The local machine
    Local,
}

impl RemoteTarget {
    /// Target reached over SSH
    pub fn ssh(config: SshConfig) -> Self {
        let name = format!("{}@{}:{}", config.username, config.host, config.port);
        Self {
            name,
            kind: TargetKind::Ssh(config),
        }
    }

    /// Target backed by a WSL distribution
    pub fn wsl(distro: impl Into<String>) -> Self {
        let distro = distro.into();
        Self {
            name: format!("wsl://{}", distro),
            kind: TargetKind::Wsl { distro },
        }
    }

    /// The local machine
    pub fn local() -> Self {
        Self {
            name: "local".to_string(),
            kind: TargetKind::Local,
        }
    }

    /// Parse a target string.
    ///
    /// Accepted forms: `local`, `wsl://<distro>`, `ssh://[user@]host[:port]`
    /// and bare `[user@]host[:port]`.
    pub fn parse(target: &str) -> Self {
        let target = target.trim();
        if target == "local" {
            return Self::local();
        }
        if let Some(distro) = target.strip_prefix("wsl://") {
            return Self::wsl(distro);
        }
        let ssh_target = target.strip_prefix("ssh://").unwrap_or(target);
        Self::ssh(SshConfig::from_target(ssh_target))
    }

    /// Display name of the target
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How commands reach the target
    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// SSH configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Remote port (default: 22)
    pub port: u16,
    /// Username
    pub username: String,
    /// SSH key path
    pub key_path: Option<PathBuf>,
    /// Extra `-o` options
    pub options: HashMap<String, String>,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            username: "root".to_string(),
            key_path: None,
            options: HashMap::new(),
            connect_timeout: 30,
        }
    }
}

impl SshConfig {
    /// Build a configuration from `[user@]host[:port]`
    pub fn from_target(target: &str) -> Self {
        let mut config = Self::default();
        let mut host = target.to_string();

        if let Some(at_pos) = target.find('@') {
            config.username = target[..at_pos].to_string();
            host = target[at_pos + 1..].to_string();
        }

        if let Some(colon_pos) = host.rfind(':') {
            if let Ok(port) = host[colon_pos + 1..].parse::<u16>() {
                config.port = port;
                host.truncate(colon_pos);
            }
        }

        config.host = host;
        config
    }

    /// Set the SSH key path
    pub fn with_key(mut self, key_path: PathBuf) -> Self {
        self.key_path = Some(key_path);
        self
    }

    /// Add an `-o key=value` option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Build the `ssh` arguments that precede the remote command
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(), "BatchMode=yes".to_string(),
            "-o".to_string(), format!("ConnectTimeout={}", self.connect_timeout),
            "-p".to_string(), self.port.to_string(),
        ];

        if let Some(key_path) = &self.key_path {
            args.push("-i".to_string());
            args.push(key_path.to_string_lossy().to_string());
        }

        // Sorted so the command line is stable between runs
        let mut options: Vec<_> = self.options.iter().collect();
        options.sort();
        for (key, value) in options {
            args.push("-o".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(format!("{}@{}", self.username, self.host));
        args
    }
}
