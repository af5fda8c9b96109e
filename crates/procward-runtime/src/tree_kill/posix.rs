//! POSIX tree kill: recurse over `pgrep -P`, children before parents.

use async_trait::async_trait;
use procward_core::{KillTreeError, ProcessTreeKiller, TerminationSignal};
use tokio::process::Command;

use super::{check_pid, run_kill_command};

const SHELL: &str = "/bin/sh";

/// `$1` is the root pid, `$2` the signal name. The exit status is that of the
/// final `kill` against the root, so a root that is already gone fails.
/// Without `pgrep` only the root is signalled.
const TERMINATE_TREE_SCRIPT: &str = r#"
terminate_tree() {
    for child in $(pgrep -P "$1" 2>/dev/null); do
        terminate_tree "$child" "$2"
    done
    kill -"$2" "$1"
}
terminate_tree "$1" "$2"
"#;

/// Tree killer for Linux, macOS and other POSIX systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixTreeKiller;

impl PosixTreeKiller {
    fn command(pid: u32, forceful: bool) -> Command {
        let signal = if forceful {
            TerminationSignal::Forceful
        } else {
            TerminationSignal::Polite
        };

        let mut command = Command::new(SHELL);
        command
            .arg("-c")
            .arg(TERMINATE_TREE_SCRIPT)
            .arg("procward-terminate-tree")
            .arg(pid.to_string())
            .arg(signal.posix_name());
        command
    }
}

#[async_trait]
impl ProcessTreeKiller for PosixTreeKiller {
    async fn kill_tree(&self, pid: u32, forceful: bool) -> Result<(), KillTreeError> {
        check_pid(pid)?;
        run_kill_command(Self::command(pid, forceful), SHELL, pid).await
    }
}
