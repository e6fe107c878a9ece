//! Command-line arguments

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use wayline::remote::{RemoteTarget, SshConfig, TargetKind};

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "wayline")]
#[command(about = "Probe remote targets and install the Wayline helper")]
#[command(after_help = "Targets: local, wsl://<distro>, ssh://[user@]host[:port] or [user@]host[:port]\n\
Set RUST_LOG (e.g. RUST_LOG=debug) to see every probe attempt.")]
pub struct Cli {
    /// SSH private key for SSH targets
    #[arg(long, global = true)]
    pub key: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Report shell, OS, architecture and home directory
    Probe {
        /// Target string
        target: String,
    },

    /// Copy a local file to the target and make it executable
    Install {
        /// Target string
        target: String,

        /// Local file
        source: PathBuf,

        /// Remote destination
        dest: String,

        /// Seconds the remote side may take to finish
        #[arg(long, value_parser = parse_secs)]
        timeout: Option<Duration>,
    },

    /// Install or update the helper, then its rc files
    Bootstrap {
        /// Target string
        target: String,

        /// Expected helper version
        #[arg(long)]
        version: String,

        /// Directory with local helper builds
        #[arg(long)]
        builds: PathBuf,

        /// Install destination override
        #[arg(long)]
        dest: Option<String>,

        /// Seconds the remote side may take to finish
        #[arg(long, value_parser = parse_secs)]
        timeout: Option<Duration>,
    },
}

impl Cli {
    /// Resolve a target string, applying `--key` to SSH targets
    pub fn target(&self, target: &str) -> RemoteTarget {
        let parsed = RemoteTarget::parse(target);
        match (parsed.kind(), &self.key) {
            (TargetKind::Ssh(config), Some(key)) => {
                RemoteTarget::ssh(SshConfig::clone(config).with_key(key.clone()))
            }
            _ => parsed,
        }
    }
}

fn parse_secs(value: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("expected whole seconds: {}", e))
}
