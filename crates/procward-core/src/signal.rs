//! Termination signals sent to supervised processes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How hard to ask a process to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSignal {
    /// Cooperative shutdown request the process may trap (SIGTERM).
    Polite,
    /// Unconditional termination (SIGKILL / `TerminateProcess`).
    Forceful,
}

impl TerminationSignal {
    #[must_use]
    pub const fn is_forceful(self) -> bool {
        matches!(self, Self::Forceful)
    }

    /// Name of the POSIX signal this maps to.
    #[must_use]
    pub const fn posix_name(self) -> &'static str {
        match self {
            Self::Polite => "TERM",
            Self::Forceful => "KILL",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.posix_name())
    }
}
