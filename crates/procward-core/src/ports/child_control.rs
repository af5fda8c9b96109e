//! Control surface of a spawned child process.

use std::io;

use crate::signal::TerminationSignal;

/// Handle to a spawned stdio child, as seen by the supervisor.
///
/// Implementations own the child's standard input exclusively; nothing else
/// may write to or close it while a supervisor holds the handle.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
pub trait ChildControl: Send + Sync {
    /// OS process identifier, if one was ever assigned.
    fn pid(&self) -> Option<u32>;

    /// Queue `line` followed by a newline on the child's standard input.
    fn write_line(&self, line: &str) -> io::Result<()>;

    /// Signal end-of-input to the child.
    ///
    /// Returns an error when the stream was already closed or broken. Lines
    /// queued before this call are still delivered ahead of EOF.
    fn end_stdin(&self) -> io::Result<()>;

    /// Send a termination signal to this process only (not its descendants).
    fn signal(&self, signal: TerminationSignal) -> io::Result<()>;

    /// Whether the child has already exited and been reaped.
    fn has_exited(&self) -> bool;
}
