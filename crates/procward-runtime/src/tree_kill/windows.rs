//! Windows tree kill through `taskkill /T`.

use async_trait::async_trait;
use procward_core::{KillTreeError, ProcessTreeKiller};
use tokio::process::Command;

use super::{check_pid, run_kill_command};

const TASKKILL: &str = "taskkill";

/// Tree killer backed by the built-in `taskkill` utility.
///
/// Windows has no cooperative signal that reaches a whole tree, so only the
/// forceful stage does anything useful.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsTreeKiller;

impl WindowsTreeKiller {
    fn args(pid: u32, forceful: bool) -> Vec<String> {
        let mut args = vec!["/T".to_string()];
        if forceful {
            args.push("/F".to_string());
        }
        args.push("/PID".to_string());
        args.push(pid.to_string());
        args
    }
}

#[async_trait]
impl ProcessTreeKiller for WindowsTreeKiller {
    async fn kill_tree(&self, pid: u32, forceful: bool) -> Result<(), KillTreeError> {
        check_pid(pid)?;

        let mut command = Command::new(TASKKILL);
        command.args(Self::args(pid, forceful));
        run_kill_command(command, TASKKILL, pid).await
    }

    fn supports_polite(&self) -> bool {
        false
    }
}
