//! Error types shared by the ports and their implementations.

use std::io;
use thiserror::Error;

/// Failure of a one-shot process-tree termination.
#[derive(Debug, Error)]
pub enum KillTreeError {
    /// Process identifiers must be positive.
    #[error("Invalid process id {0}: must be positive")]
    InvalidPid(u32),

    /// The OS termination tool could not be launched at all.
    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: &'static str,
        #[source]
        source: io::Error,
    },

    /// The termination tool ran but reported failure.
    #[error("{tool} failed for pid {pid} (exit {code:?}): {output}")]
    CommandFailed {
        tool: &'static str,
        pid: u32,
        code: Option<i32>,
        output: String,
    },
}

/// Failure to start a supervised child.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Working directory is missing or not a directory.
    #[error("Invalid working directory: {0}")]
    InvalidWorkingDir(String),

    /// The OS refused to start the process.
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A piped stdio stream was not available after spawn.
    #[error("Spawned process is missing its {0} pipe")]
    MissingPipe(&'static str),
}

/// Invalid supervisor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Grace period must be greater than zero")]
    ZeroGracePeriod,

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
