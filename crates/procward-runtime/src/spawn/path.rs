//! Working-directory validation and PATH construction for spawned children.

use std::env;
use std::ffi::OsString;
use std::path::Path;

use procward_core::SpawnError;

/// Platform-specific PATH separator
#[cfg(unix)]
pub(crate) const PATH_SEPARATOR: &str = ":";
#[cfg(windows)]
pub(crate) const PATH_SEPARATOR: &str = ";";

/// Paths bundled macOS apps usually lose from their inherited PATH
#[cfg(target_os = "macos")]
const MACOS_DEFAULT_PATHS: &str = "/opt/homebrew/bin:/usr/local/bin:/usr/bin:/bin:/usr/sbin:/sbin";

/// Check that `cwd` exists and is a directory.
pub fn validate_working_dir(cwd: &Path) -> Result<(), SpawnError> {
    if !cwd.exists() {
        return Err(SpawnError::InvalidWorkingDir(format!(
            "{} does not exist",
            cwd.display()
        )));
    }

    if !cwd.is_dir() {
        return Err(SpawnError::InvalidWorkingDir(format!(
            "{} is not a directory",
            cwd.display()
        )));
    }

    Ok(())
}

/// Build the PATH handed to a child process.
///
/// Order:
/// 1. Directory containing the executable, when it is an absolute path
/// 2. `base_path` (the caller's PATH override) or the current process PATH
/// 3. Platform defaults (macOS only)
/// 4. `path_extra` entries
///
/// Entries are deduplicated, first occurrence wins.
pub fn build_effective_path(
    executable: &str,
    base_path: Option<&str>,
    path_extra: Option<&str>,
) -> OsString {
    let mut entries: Vec<String> = Vec::new();

    let exe = Path::new(executable);
    if exe.is_absolute() {
        if let Some(dir) = exe.parent().and_then(Path::to_str) {
            entries.push(dir.to_string());
        }
    }

    let inherited = base_path
        .map(str::to_string)
        .or_else(|| env::var_os("PATH").and_then(|p| p.into_string().ok()));
    if let Some(inherited) = inherited {
        push_split(&mut entries, &inherited);
    }

    #[cfg(target_os = "macos")]
    {
        for entry in MACOS_DEFAULT_PATHS.split(':') {
            entries.push(entry.to_string());
        }
    }

    if let Some(extra) = path_extra {
        push_split(&mut entries, extra);
    }

    let mut seen = std::collections::HashSet::new();
    let deduped: Vec<String> = entries
        .into_iter()
        .filter(|entry| seen.insert(entry.clone()))
        .collect();

    OsString::from(deduped.join(PATH_SEPARATOR))
}

fn push_split(entries: &mut Vec<String>, joined: &str) {
    entries.extend(
        joined
            .split(PATH_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string),
    );
}
