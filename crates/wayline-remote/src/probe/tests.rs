//! Unit tests for environment probing

use super::*;
use crate::test_utils::ScriptedExecutor;

const CMD_HELPER_PROBE: &str = r"(dir 2>&1 *``|echo %userprofile%\.waveterm\bin\wsh.exe);&<# rem #>echo none";

#[tokio::test]
async fn test_os_falls_back_to_powershell() {
    let executor = ScriptedExecutor::new()
        .fail("uname -s", 127, "uname: not recognized")
        .reply("echo %OS%", "%OS%\r\n")
        .reply("echo $env:OS", "Windows_NT\r\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.os().await.unwrap(), "windows");
    assert_eq!(executor.commands(), vec!["uname -s", "echo %OS%", "echo $env:OS"]);
}

#[tokio::test]
async fn test_os_stops_at_first_success() {
    let executor = ScriptedExecutor::new().reply("uname -s", "Linux\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.os().await.unwrap(), "linux");
    assert_eq!(executor.commands(), vec!["uname -s"]);
}

#[tokio::test]
async fn test_os_rejects_empty_output() {
    let executor = ScriptedExecutor::new()
        .reply("uname -s", "  \n")
        .reply("echo %OS%", "Windows_NT");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.os().await.unwrap(), "windows");
}

#[tokio::test]
async fn test_os_aggregates_every_failure() {
    let executor = ScriptedExecutor::new()
        .fail("uname -s", 1, "nope")
        .reply("echo %OS%", "%OS%")
        .fail("echo $env:OS", 2, "also nope");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = probe.os().await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("unable to determine os: {unix: "));
    assert!(message.contains("cmd: variable not expanded: %OS%"));
    assert!(message.contains("powershell: "));

    match err {
        ProbeError::Exhausted { fact, attempts } => {
            assert_eq!(fact, "os");
            let dialects: Vec<_> = attempts.iter().map(|a| a.dialect).collect();
            assert_eq!(
                dialects,
                vec![ShellDialect::Posix, ShellDialect::WindowsCmd, ShellDialect::PowerShell]
            );
        }
        other => panic!("Expected Exhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn test_arch_normalization() {
    let target = RemoteTarget::local();

    let executor = ScriptedExecutor::new().reply("uname -m", "x86_64\n");
    let probe = RemoteProbe::new(&executor, &target);
    assert_eq!(probe.arch().await.unwrap(), "x64");

    let executor = ScriptedExecutor::new().reply("uname -m", "arm64\n");
    let probe = RemoteProbe::new(&executor, &target);
    assert_eq!(probe.arch().await.unwrap(), "arm64");

    let executor = ScriptedExecutor::new()
        .reply("echo %PROCESSOR_ARCHITECTURE%", "%PROCESSOR_ARCHITECTURE%")
        .reply("echo $env:PROCESSOR_ARCHITECTURE", "AMD64\r\n");
    let probe = RemoteProbe::new(&executor, &target);
    assert_eq!(probe.arch().await.unwrap(), "amd64");
}

#[tokio::test]
async fn test_arch_exhausted() {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let err = probe.arch().await.unwrap_err();
    assert!(err.to_string().starts_with("unable to determine architecture: {unix: "));
}

#[test]
fn test_normalizers() {
    assert_eq!(normalize_os_uname("Darwin\n"), "darwin");
    assert_eq!(normalize_os_windows("Windows_NT\r\n"), "windows");
    assert_eq!(normalize_os_windows("Plan9"), "plan9");
    assert_eq!(normalize_architecture(" X86_64 "), "x64");
    assert_eq!(normalize_architecture("aarch64"), "aarch64");
    assert_eq!(normalize_first_line("\n/usr/bin/bash\n/bin/bash\n"), "/usr/bin/bash");
}

#[tokio::test]
async fn test_helper_path_from_which() {
    let executor = ScriptedExecutor::new().reply("which wsh", "/usr/local/bin/wsh\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.helper_path().await, "/usr/local/bin/wsh");
}

#[tokio::test]
async fn test_helper_path_from_userprofile() {
    let executor = ScriptedExecutor::new()
        .reply(CMD_HELPER_PROBE, "C:\\Users\\me\\.waveterm\\bin\\wsh.exe\r\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.helper_path().await, r"C:\Users\me\.waveterm\bin\wsh.exe");
}

#[tokio::test]
async fn test_helper_path_default() {
    let executor = ScriptedExecutor::new().reply(CMD_HELPER_PROBE, "none\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.helper_path().await, "~/.waveterm/bin/wsh");
    assert_eq!(
        executor.commands(),
        vec!["which wsh".to_string(), "where.exe wsh".to_string(), CMD_HELPER_PROBE.to_string()]
    );
}

#[tokio::test]
async fn test_helper_path_custom_config() {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let config = ProbeConfig::default()
        .with_helper_name("agent")
        .with_default_helper_path("/opt/agent");
    let probe = RemoteProbe::new(&executor, &target).with_config(config);

    assert_eq!(probe.helper_path().await, "/opt/agent");
    assert_eq!(executor.commands()[0], "which agent");
}

#[tokio::test]
async fn test_detect_shell() {
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/usr/local/bin/wsh\n")
        .reply("/usr/local/bin/wsh shell", "/usr/bin/zsh\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.detect_shell().await, "/usr/bin/zsh");
    assert_eq!(probe.dialect().await, ShellDialect::Posix);
}

#[tokio::test]
async fn test_detect_shell_falls_back_to_bash() {
    let executor = ScriptedExecutor::new();
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.detect_shell().await, "/bin/bash");
    assert!(executor.commands().contains(&"~/.waveterm/bin/wsh shell".to_string()));
}

#[tokio::test]
async fn test_dialect_powershell() {
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/usr/local/bin/wsh\n")
        .reply("/usr/local/bin/wsh shell", "/usr/bin/pwsh\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.dialect().await, ShellDialect::PowerShell);
}

#[tokio::test]
async fn test_has_bash() {
    let target = RemoteTarget::local();

    let executor = ScriptedExecutor::new().reply("which bash", "/bin/bash\n");
    assert!(RemoteProbe::new(&executor, &target).has_bash().await);

    let executor = ScriptedExecutor::new().reply("where.exe bash", "C:\\Windows\\System32\\bash.exe\r\n");
    assert!(RemoteProbe::new(&executor, &target).has_bash().await);

    // Success with nothing printed does not count
    let executor = ScriptedExecutor::new().reply("which bash", "");
    assert!(!RemoteProbe::new(&executor, &target).has_bash().await);

    let executor = ScriptedExecutor::new();
    let probe = RemoteProbe::new(&executor, &target);
    assert!(!probe.has_bash().await);
    assert_eq!(executor.commands(), vec!["which bash", "where.exe bash"]);
}

#[tokio::test]
async fn test_home_dir() {
    let target = RemoteTarget::local();

    let executor = ScriptedExecutor::new().reply(r#"echo "$HOME""#, "/home/dev\n");
    assert_eq!(RemoteProbe::new(&executor, &target).home_dir().await, "/home/dev");

    // cmd echoes the quoted variable back verbatim
    let executor = ScriptedExecutor::new()
        .reply(r#"echo "$HOME""#, "\"$HOME\"\r\n")
        .reply("echo %userprofile%", "C:\\Users\\dev\r\n");
    assert_eq!(RemoteProbe::new(&executor, &target).home_dir().await, r"C:\Users\dev");

    let executor = ScriptedExecutor::new();
    assert_eq!(RemoteProbe::new(&executor, &target).home_dir().await, "~");
}

#[tokio::test]
async fn test_helper_subcommands() {
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/usr/local/bin/wsh\n")
        .reply("/usr/local/bin/wsh version", "wsh v0.9.3\n")
        .reply("/usr/local/bin/wsh rcfiles", "");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    assert_eq!(probe.helper_version().await.unwrap(), "wsh v0.9.3");
    probe.install_rc_files().await.unwrap();
}

#[tokio::test]
async fn test_helper_subcommand_errors_surface() {
    let executor = ScriptedExecutor::new().fail("~/.waveterm/bin/wsh rcfiles", 126, "permission denied");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    match probe.install_rc_files().await.unwrap_err() {
        ExecError::CommandFailed { code, stderr } => {
            assert_eq!(code, Some(126));
            assert_eq!(stderr, "permission denied");
        }
        other => panic!("Expected CommandFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_probe() {
    let executor = ScriptedExecutor::new().reply("uname -s", "Linux");
    let target = RemoteTarget::local();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let probe = RemoteProbe::new(&executor, &target).with_cancellation(cancel);

    assert!(matches!(probe.os().await, Err(ProbeError::Cancelled)));
    // Never-fail probes fall back to their defaults
    assert_eq!(probe.home_dir().await, "~");
    assert_eq!(probe.helper_path().await, "~/.waveterm/bin/wsh");
    assert!(!probe.has_bash().await);
    assert!(executor.commands().is_empty());
}

#[tokio::test]
async fn test_probe_all() {
    let executor = ScriptedExecutor::new()
        .reply("which wsh", "/usr/local/bin/wsh\n")
        .reply("/usr/local/bin/wsh shell", "/bin/bash\n")
        .reply("which bash", "/bin/bash\n")
        .reply("uname -s", "Linux\n")
        .reply(r#"echo "$HOME""#, "/home/dev\n");
    let target = RemoteTarget::local();
    let probe = RemoteProbe::new(&executor, &target);

    let result = probe.probe_all().await;

    assert_eq!(result.helper_path, "/usr/local/bin/wsh");
    assert_eq!(result.shell, "/bin/bash");
    assert_eq!(result.dialect, ShellDialect::Posix);
    assert!(result.has_bash);
    assert_eq!(result.os.unwrap(), "linux");
    assert!(result.arch.is_err());
    assert_eq!(result.home_dir, "/home/dev");
    assert_eq!(
        executor.commands().iter().filter(|c| c.as_str() == "which wsh").count(),
        1
    );
}

mod normalization {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_uname_output_is_trimmed_lowercase(
            pad in "[ \t\r\n]{0,3}",
            word in "[A-Za-z0-9_]{1,20}",
        ) {
            let os = normalize_os_uname(&format!("{pad}{word}{pad}"));
            prop_assert_eq!(os.clone(), word.to_lowercase());
            prop_assert_eq!(normalize_os_uname(&os), os);
        }

        #[test]
        fn test_windows_os_has_no_underscore(word in "[A-Za-z0-9_]{0,20}") {
            let os = normalize_os_windows(&format!("{word}\r\n"));
            prop_assert!(!os.contains('_'));
            prop_assert!(word.to_lowercase().starts_with(&os));
        }

        #[test]
        fn test_architecture_is_stable(word in "[A-Za-z0-9_]{1,12}") {
            let arch = normalize_architecture(&word);
            prop_assert_ne!(arch.as_str(), "x86_64");
            prop_assert_eq!(normalize_architecture(&arch), arch);
        }
    }
}
