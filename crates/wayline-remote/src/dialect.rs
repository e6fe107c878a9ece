//! Shell dialects and dialect-aware quoting

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command-line syntax family understood by a target's default interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShellDialect {
    /// POSIX-compatible shell (sh, bash, zsh, ...)
    Posix,
    /// Windows `cmd.exe`
    WindowsCmd,
    /// Windows PowerShell or PowerShell Core
    PowerShell,
    /// Could not be determined
    Unknown,
}

impl ShellDialect {
    /// Short label used in aggregated probe errors
    pub fn label(&self) -> &'static str {
        match self {
            Self::Posix => "unix",
            Self::WindowsCmd => "cmd",
            Self::PowerShell => "powershell",
            Self::Unknown => "unknown",
        }
    }

    /// Quote a single argument so this dialect reads it as one literal word
    pub fn quote(&self, value: &str) -> String {
        match self {
            Self::Posix | Self::Unknown => quote_posix(value),
            Self::WindowsCmd => format!("\"{}\"", value.replace('"', "\"\"")),
            Self::PowerShell => format!("'{}'", value.replace('\'', "''")),
        }
    }
}

impl fmt::Display for ShellDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a shell executable path by its file name.
///
/// Only the last path component is inspected, so directories named after a
/// shell do not affect the result. Both `/` and `\` count as separators since
/// the path may come from a Windows target.
pub fn classify_dialect(shell_path: &str) -> ShellDialect {
    let base = base_name(shell_path);
    if base.is_empty() {
        return ShellDialect::Unknown;
    }
    if base.contains("powershell") || base.contains("pwsh") {
        return ShellDialect::PowerShell;
    }
    if base.eq_ignore_ascii_case("cmd") || base.eq_ignore_ascii_case("cmd.exe") {
        return ShellDialect::WindowsCmd;
    }
    ShellDialect::Posix
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim().trim_end_matches(['/', '\\']);
    trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed)
}

/// Single-quote a value for a POSIX shell
pub fn quote_posix(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

/// Quote a path for a POSIX shell, keeping a leading `~` expandable
pub fn quote_posix_path(path: &str) -> String {
    if path == "~" {
        return "\"$HOME\"".to_string();
    }
    match path.strip_prefix("~/") {
        Some("") => "\"$HOME\"/".to_string(),
        Some(rest) => format!("\"$HOME\"/{}", quote_posix(rest)),
        None => quote_posix(path),
    }
}

/// Render a path to be run as a program in a command whose dialect is not yet
/// known.
///
/// Paths made only of characters that no supported dialect treats specially
/// are passed through untouched; anything else is wrapped in double quotes,
/// which POSIX shells, `cmd` and PowerShell all accept.
pub fn quote_program(path: &str) -> String {
    if !path.is_empty() && path.chars().all(is_plain_char) {
        return path.to_string();
    }
    let escaped = path
        .replace('"', "\\\"")
        .replace('$', "\\$")
        .replace('`', "\\`");
    match escaped.strip_prefix("~/") {
        Some(rest) => format!("~/\"{}\"", rest),
        None => format!("\"{}\"", escaped),
    }
}

fn is_plain_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '\\' | '.' | '_' | '-' | ':' | '~' | '+')
}
