//! Helper binary bootstrap
//!
//! Makes sure the target runs the expected helper version: reads the version
//! of whatever helper is installed, installs the matching local build for the
//! target's OS and architecture when it is missing or outdated, then has the
//! helper install its shell rc files.

use crate::Result;
use std::path::PathBuf;
use tracing::{debug, info};
use wayline_remote::{ExecError, InstallReport, Installer, InstallerConfig, RemoteProbe};

/// Where local helper builds live and which version is expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// Expected helper version, e.g. `v0.9.3`
    pub version: String,
    /// Directory holding one build per OS and architecture
    pub build_dir: PathBuf,
    /// File name prefix of the builds
    pub binary_prefix: String,
    /// Install destination; the probe's default helper path when unset
    pub install_path: Option<String>,
}

impl HelperConfig {
    /// Configuration for `version` with builds under `build_dir`
    pub fn new(version: impl Into<String>, build_dir: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            build_dir: build_dir.into(),
            binary_prefix: "wsh".to_string(),
            install_path: None,
        }
    }

    /// Install somewhere other than the default helper path
    pub fn with_install_path(mut self, path: impl Into<String>) -> Self {
        self.install_path = Some(path.into());
        self
    }

    /// Set the build file name prefix
    pub fn with_binary_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.binary_prefix = prefix.into();
        self
    }

    /// Local build for a target, e.g. `wsh-v0.9.3-linux.x64`
    pub fn local_build(&self, os: &str, arch: &str) -> PathBuf {
        let mut name = format!("{}-{}-{}.{}", self.binary_prefix, self.version, os, arch);
        if os == "windows" {
            name.push_str(".exe");
        }
        self.build_dir.join(name)
    }

    /// Whether a reported version string matches the expected version.
    ///
    /// Helpers print either the bare version or `<name> <version>`.
    pub fn is_current(&self, reported: &str) -> bool {
        let reported = reported.trim();
        reported == self.version || reported.split_whitespace().any(|word| word == self.version)
    }
}

/// What a bootstrap run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The installed helper already had the expected version
    UpToDate {
        /// Reported version
        version: String,
    },
    /// A local build was installed
    Installed {
        /// Version reported before the install, if a helper was found
        previous: Option<String>,
        /// Details of the install
        report: InstallReport,
    },
}

/// Brings a target's helper up to date
pub struct HelperBootstrap<'a> {
    probe: &'a RemoteProbe<'a>,
    config: HelperConfig,
    installer_config: InstallerConfig,
}

impl<'a> HelperBootstrap<'a> {
    /// Create a bootstrap run over a probing session
    pub fn new(probe: &'a RemoteProbe<'a>, config: HelperConfig) -> Self {
        Self {
            probe,
            config,
            installer_config: InstallerConfig::default(),
        }
    }

    /// Tune the installer
    pub fn with_installer_config(mut self, config: InstallerConfig) -> Self {
        self.installer_config = config;
        self
    }

    /// Check the helper version, install when needed, then install rc files
    pub async fn run(&self) -> Result<BootstrapOutcome> {
        let target = self.probe.target();

        let previous = match self.probe.helper_version().await {
            Ok(version) => Some(version),
            Err(ExecError::Cancelled) => return Err(ExecError::Cancelled.into()),
            Err(e) => {
                debug!("No usable helper on {}: {}", target, e);
                None
            }
        };

        let outcome = match previous {
            Some(version) if self.config.is_current(&version) => {
                info!("Helper on {} is up to date ({})", target, version);
                BootstrapOutcome::UpToDate { version }
            }
            previous => {
                info!(
                    "Helper on {} is {}; installing {}",
                    target,
                    previous.as_deref().unwrap_or("missing"),
                    self.config.version
                );
                let report = self.install().await?;
                BootstrapOutcome::Installed { previous, report }
            }
        };

        self.probe.install_rc_files().await?;
        Ok(outcome)
    }

    async fn install(&self) -> Result<InstallReport> {
        let os = self.probe.os().await?;
        let arch = self.probe.arch().await?;
        let source = self.config.local_build(&os, &arch);
        debug!("Using local build {} for {}/{}", source.display(), os, arch);

        let dest = self
            .config
            .install_path
            .clone()
            .unwrap_or_else(|| self.probe.config().default_helper_path.clone());

        let report = Installer::new(self.probe)
            .with_config(self.installer_config.clone())
            .install(&source, &dest)
            .await?;
        Ok(report)
    }
}
