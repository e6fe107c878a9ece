//! End-to-end tests for probing, installing and bootstrapping a helper

use anyhow::Result;
use std::io::Write;
use tempfile::TempDir;
use wayline::remote::test_utils::{PipeBehavior, ScriptedExecutor};
use wayline::remote::{InstallError, Installer, ProbeError, RemoteProbe, RemoteTarget};
use wayline::{BootstrapOutcome, HelperBootstrap, HelperConfig, WaylineError};

const HELPER: &str = "~/.waveterm/bin/wsh";

fn build_dir(name: &str, contents: &[u8]) -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    let mut file = std::fs::File::create(dir.path().join(name))?;
    file.write_all(contents)?;
    Ok(dir)
}

#[tokio::test]
async fn test_windows_os_through_powershell() -> Result<()> {
    let executor = ScriptedExecutor::new()
        .fail("uname -s", 1, "'uname' is not recognized")
        .reply("echo %OS%", "%OS%")
        .reply("echo $env:OS", "Windows_NT");
    let target = RemoteTarget::wsl("Ubuntu");
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.os().await?, "windows");
    Ok(())
}

#[tokio::test]
async fn test_critical_probe_failure_names_every_dialect() {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = probe.arch().await.unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, ProbeError::Exhausted { .. }));
    for label in ["unix: ", "cmd: ", "powershell: "] {
        assert!(message.contains(label), "missing {} in {}", label, message);
    }
}

#[tokio::test]
async fn test_install_without_bash_uses_default_shell() -> Result<()> {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let script = Installer::new(&probe).render_script("/home/dev/bin/wsh").await;

    assert!(!script.contains("bash -c"));
    assert!(script.contains("'/home/dev/bin'"));
    assert!(script.contains("'/home/dev/bin/wsh.temp'"));
    assert!(script.contains("'/home/dev/bin/wsh'"));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_installs_missing_helper() -> Result<()> {
    let dir = build_dir("wsh-v0.9.3-linux.x64", b"new helper")?;
    let executor = ScriptedExecutor::new()
        .reply("which bash", "/bin/bash")
        .reply("uname -s", "Linux")
        .reply("uname -m", "x86_64")
        .reply(format!("{} rcfiles", HELPER), "");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let outcome = HelperBootstrap::new(&probe, HelperConfig::new("v0.9.3", dir.path()))
        .run()
        .await?;

    match outcome {
        BootstrapOutcome::Installed { previous, report } => {
            assert_eq!(previous, None);
            assert_eq!(report.destination, HELPER);
            assert_eq!(report.bytes_copied, 10);
        }
        other => panic!("Expected Installed, got {:?}", other),
    }
    assert_eq!(executor.received(), b"new helper");
    assert_eq!(executor.commands().last().map(String::as_str), Some("~/.waveterm/bin/wsh rcfiles"));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_replaces_outdated_helper() -> Result<()> {
    let dir = build_dir("wsh-v0.9.3-darwin.arm64", b"helper")?;
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/opt/wave/wsh")
        .reply("/opt/wave/wsh version", "wsh v0.9.1")
        .reply("uname -s", "Darwin")
        .reply("uname -m", "arm64")
        .reply("/opt/wave/wsh rcfiles", "");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);
    let config = HelperConfig::new("v0.9.3", dir.path()).with_install_path("/opt/wave/wsh");

    let outcome = HelperBootstrap::new(&probe, config).run().await?;

    match outcome {
        BootstrapOutcome::Installed { previous, report } => {
            assert_eq!(previous.as_deref(), Some("wsh v0.9.1"));
            assert_eq!(report.destination, "/opt/wave/wsh");
        }
        other => panic!("Expected Installed, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_skips_current_helper() -> Result<()> {
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/usr/local/bin/wsh")
        .reply("/usr/local/bin/wsh version", "v0.9.3")
        .reply("/usr/local/bin/wsh rcfiles", "");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let outcome = HelperBootstrap::new(&probe, HelperConfig::new("v0.9.3", "/nonexistent"))
        .run()
        .await?;

    assert_eq!(outcome, BootstrapOutcome::UpToDate { version: "v0.9.3".to_string() });
    assert!(executor.commands().iter().all(|c| !c.starts_with("uname")));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_reports_unknown_platform() {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = HelperBootstrap::new(&probe, HelperConfig::new("v0.9.3", "/nonexistent"))
        .run()
        .await
        .unwrap_err();

    match err {
        WaylineError::Probe(ProbeError::Exhausted { fact, .. }) => assert_eq!(fact, "os"),
        other => panic!("Expected os probe failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_bootstrap_surfaces_failed_install() -> Result<()> {
    let dir = build_dir("wsh-v0.9.3-linux.x64", b"helper")?;
    let executor = ScriptedExecutor::new()
        .reply("uname -s", "Linux")
        .reply("uname -m", "x86_64")
        .with_pipe_behavior(PipeBehavior::Exit(1));
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = HelperBootstrap::new(&probe, HelperConfig::new("v0.9.3", dir.path()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, WaylineError::Install(InstallError::Unverified { .. })));
    assert!(executor.commands().iter().all(|c| !c.ends_with("rcfiles")));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_missing_build() {
    let executor = ScriptedExecutor::new()
        .reply("uname -s", "Linux")
        .reply("uname -m", "riscv64");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = HelperBootstrap::new(&probe, HelperConfig::new("v0.9.3", "/nonexistent"))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, WaylineError::Install(InstallError::SourceOpen { .. })));
    assert!(err.to_string().contains("wsh-v0.9.3-linux.riscv64"));
}
