//! Subprocess argument formatting.
//!
//! On Windows, `.bat` and `.cmd` files can only be started through the shell,
//! and the shell reinterprets unquoted arguments (CVE-2024-27980). Batch
//! targets are therefore run in shell mode with every space-containing token
//! quoted. Everything else is passed through untouched.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use procward_core::Platform;
use tracing::debug;

/// Extensions that force shell-mode invocation on Windows.
const WINDOWS_SCRIPT_EXTENSIONS: [&str; 2] = ["bat", "cmd"];

/// Executable and arguments ready to hand to the spawner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedCommand {
    pub executable: String,
    pub args: Vec<String>,
    /// Run through the platform shell instead of executing directly.
    pub shell: bool,
}

impl FormattedCommand {
    fn passthrough(executable: &str, args: &[String]) -> Self {
        Self {
            executable: executable.to_string(),
            args: args.to_vec(),
            shell: false,
        }
    }

    /// Executable path without the quoting added for shell mode.
    pub fn program_path(&self) -> &str {
        if !self.shell {
            return &self.executable;
        }
        self.executable
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(&self.executable)
    }
}

/// Format a command for the platform this binary runs on.
pub fn format_subprocess_arguments(
    executable: &str,
    args: &[String],
    cwd: Option<&Path>,
    env: &[(String, String)],
) -> FormattedCommand {
    format_for_platform(Platform::current(), executable, args, cwd, env)
}

/// Format a command as it would be on `platform`.
///
/// The only side effect is the PATH lookup of `executable` on Windows.
pub fn format_for_platform(
    platform: Platform,
    executable: &str,
    args: &[String],
    cwd: Option<&Path>,
    env: &[(String, String)],
) -> FormattedCommand {
    if !platform.is_windows() {
        return FormattedCommand::passthrough(executable, args);
    }

    let Some(found) = find_executable(executable, cwd, env) else {
        return FormattedCommand::passthrough(executable, args);
    };

    if !is_windows_script(&found) {
        return FormattedCommand::passthrough(executable, args);
    }

    let resolved = found.to_string_lossy();
    debug!(executable = %resolved, "batch script target, using quoted shell invocation");

    FormattedCommand {
        executable: quote_if_spaced(&resolved),
        args: args.iter().map(|arg| quote_if_spaced(arg)).collect(),
        shell: true,
    }
}

fn find_executable(executable: &str, cwd: Option<&Path>, env: &[(String, String)]) -> Option<PathBuf> {
    // Windows env keys are case-insensitive, so honour `Path` as well as `PATH`
    let search_path: Option<OsString> = env
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case("PATH"))
        .map(|(_, value)| OsString::from(value))
        .or_else(|| std::env::var_os("PATH"));

    let cwd = match cwd {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().ok()?,
    };

    which::which_in(executable, search_path, cwd).ok()
}

fn is_windows_script(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WINDOWS_SCRIPT_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

fn quote_if_spaced(token: &str) -> String {
    if token.contains(' ') {
        format!("\"{token}\"")
    } else {
        token.to_string()
    }
}
