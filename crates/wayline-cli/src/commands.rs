//! Command implementations

use crate::args::{Cli, Command};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wayline::remote::{
    CommandExecutor, Installer, InstallerConfig, RemoteProbe, RemoteTarget, SubprocessExecutor,
};
use wayline::{BootstrapOutcome, HelperBootstrap, HelperConfig};

/// Run a parsed command line until it finishes or `cancel` fires
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let executor = SubprocessExecutor::new();

    match &cli.command {
        Command::Probe { target } => run_probe(&executor, &cli.target(target), cancel).await,
        Command::Install {
            target,
            source,
            dest,
            timeout,
        } => run_install(&executor, &cli.target(target), source, dest, *timeout, cancel).await,
        Command::Bootstrap {
            target,
            version,
            builds,
            dest,
            timeout,
        } => {
            let mut config = HelperConfig::new(version.clone(), builds.clone());
            if let Some(dest) = dest {
                config = config.with_install_path(dest.clone());
            }
            run_bootstrap(&executor, &cli.target(target), config, *timeout, cancel).await
        }
    }
}

fn installer_config(timeout: Option<Duration>) -> InstallerConfig {
    match timeout {
        Some(timeout) => InstallerConfig::default().with_completion_timeout(timeout),
        None => InstallerConfig::default(),
    }
}

async fn run_probe(
    executor: &dyn CommandExecutor,
    target: &RemoteTarget,
    cancel: CancellationToken,
) -> Result<()> {
    info!("Probing {}", target);
    let probe = RemoteProbe::new(executor, target).with_cancellation(cancel);
    let result = probe.probe_all().await;

    println!("target:      {}", target);
    println!("helper:      {}", result.helper_path);
    println!("shell:       {} ({})", result.shell, result.dialect);
    println!("bash:        {}", if result.has_bash { "yes" } else { "no" });
    match &result.os {
        Ok(os) => println!("os:          {}", os),
        Err(e) => println!("os:          {}", e),
    }
    match &result.arch {
        Ok(arch) => println!("arch:        {}", arch),
        Err(e) => println!("arch:        {}", e),
    }
    println!("home:        {}", result.home_dir);
    Ok(())
}

async fn run_install(
    executor: &dyn CommandExecutor,
    target: &RemoteTarget,
    source: &Path,
    dest: &str,
    timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<()> {
    let probe = RemoteProbe::new(executor, target).with_cancellation(cancel);
    let report = Installer::new(&probe)
        .with_config(installer_config(timeout))
        .install(source, dest)
        .await
        .with_context(|| format!("installing {} on {}", source.display(), target))?;

    println!(
        "installed {} ({} bytes) on {}",
        report.destination, report.bytes_copied, target
    );
    Ok(())
}

async fn run_bootstrap(
    executor: &dyn CommandExecutor,
    target: &RemoteTarget,
    config: HelperConfig,
    timeout: Option<Duration>,
    cancel: CancellationToken,
) -> Result<()> {
    let probe = RemoteProbe::new(executor, target).with_cancellation(cancel);
    let outcome = HelperBootstrap::new(&probe, config)
        .with_installer_config(installer_config(timeout))
        .run()
        .await
        .with_context(|| format!("bootstrapping helper on {}", target))?;

    match outcome {
        BootstrapOutcome::UpToDate { version } => {
            println!("helper on {} is up to date ({})", target, version);
        }
        BootstrapOutcome::Installed { previous, report } => {
            println!(
                "installed helper at {} on {} (was {})",
                report.destination,
                target,
                previous.as_deref().unwrap_or("missing")
            );
        }
    }
    Ok(())
}
