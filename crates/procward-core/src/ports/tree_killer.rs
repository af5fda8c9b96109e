//! Process-tree termination port.

use async_trait::async_trait;

use super::KillTreeError;

/// Terminates a process and all of its descendants.
///
/// This is a pure one-shot command with no knowledge of supervisor state.
/// Retry and escalation policy belong to the caller.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ProcessTreeKiller: Send + Sync {
    /// Terminate `pid` and its descendants.
    ///
    /// `forceful = false` asks politely (SIGTERM); `true` kills unconditionally.
    /// Resolves once the OS termination tool has finished.
    async fn kill_tree(&self, pid: u32, forceful: bool) -> Result<(), KillTreeError>;

    /// Whether a non-forceful tree kill is meaningful on this platform.
    ///
    /// When false the supervisor skips the polite tree kill and relies on the
    /// forceful stage alone.
    fn supports_polite(&self) -> bool {
        true
    }
}
