#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod spawn;
mod stream;
pub mod supervisor;
pub mod tree_kill;

// Re-export the supervisor and its collaborators
pub use spawn::{
    ChildProcess, ExitOutcome, FormattedCommand, OutputReaders, SpawnRequest, SpawnedProcess,
    StdioSpawner, format_for_platform, format_subprocess_arguments,
};
pub use stream::spawn_line_reader;
pub use supervisor::ProcessLifecycleSupervisor;
pub use tree_kill::{PosixTreeKiller, WindowsTreeKiller, platform_tree_killer};

// Re-export core types callers need alongside the runtime
pub use procward_core::{
    ChildControl, KillTreeError, LifecycleState, OutputSink, Platform, ProcessTreeKiller,
    SpawnError, SupervisorConfig, TerminationSignal,
};
