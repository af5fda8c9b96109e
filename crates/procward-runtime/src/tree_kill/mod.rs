//! Process-tree termination through OS tooling.
//!
//! Two implementations of `ProcessTreeKiller`:
//! - `PosixTreeKiller`: a small `/bin/sh` procedure walking `pgrep -P`
//! - `WindowsTreeKiller`: `taskkill /T`
//!
//! Both are one-shot commands. They report failure (including the tool's
//! captured output) and leave any fallback to the caller.

mod posix;
mod windows;

use std::sync::Arc;

use procward_core::{KillTreeError, Platform, ProcessTreeKiller};
use tokio::process::Command;
use tracing::debug;

pub use posix::PosixTreeKiller;
pub use windows::WindowsTreeKiller;

/// Pick the tree killer for `platform`.
pub fn platform_tree_killer(platform: Platform) -> Arc<dyn ProcessTreeKiller> {
    match platform {
        Platform::Windows => Arc::new(WindowsTreeKiller),
        Platform::Posix => Arc::new(PosixTreeKiller),
    }
}

/// Run a termination command to completion, mapping failure to `KillTreeError`.
async fn run_kill_command(
    mut command: Command,
    tool: &'static str,
    pid: u32,
) -> Result<(), KillTreeError> {
    let output = command
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|source| KillTreeError::Launch { tool, source })?;

    if output.status.success() {
        debug!(pid, tool, "process tree terminated");
        return Ok(());
    }

    let mut captured = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !captured.is_empty() {
            captured.push('\n');
        }
        captured.push_str(stderr);
    }

    Err(KillTreeError::CommandFailed {
        tool,
        pid,
        code: output.status.code(),
        output: captured,
    })
}

fn check_pid(pid: u32) -> Result<(), KillTreeError> {
    if pid == 0 {
        return Err(KillTreeError::InvalidPid(pid));
    }
    Ok(())
}
