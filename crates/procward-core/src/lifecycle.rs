//! Shutdown lifecycle of a supervised stdio process.
//!
//! A supervised process only ever moves forward through
//! `Running → StdinEnded → KilledPolite → KilledForceful`. The polite stage may
//! be skipped when the owner asks for a second stop, but no state is ever
//! revisited once left.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a supervised process.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Process is running and accepting writes.
    #[default]
    Running,
    /// Standard input was closed; waiting for the process to exit on its own.
    StdinEnded,
    /// A polite termination signal was sent to the process tree.
    KilledPolite,
    /// A forceful termination signal was sent. Terminal.
    KilledForceful,
}

impl LifecycleState {
    /// Whether shutdown has begun.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Whether this is the final state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::KilledForceful)
    }

    /// Check a single transition against the lifecycle table.
    ///
    /// `KilledForceful → KilledForceful` is allowed so that repeated forceful
    /// escalation stays idempotent.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::StdinEnded)
                | (Self::StdinEnded, Self::KilledPolite | Self::KilledForceful)
                | (Self::KilledPolite | Self::KilledForceful, Self::KilledForceful)
        )
    }

    /// Check an observed sequence of states.
    ///
    /// Consecutive duplicates are fine (the same state observed twice);
    /// anything else must be an allowed transition.
    #[must_use]
    pub fn is_valid_history(states: &[Self]) -> bool {
        states
            .windows(2)
            .all(|pair| pair[0] == pair[1] || pair[0].can_transition_to(pair[1]))
    }

    /// Stable snake_case name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::StdinEnded => "stdin_ended",
            Self::KilledPolite => "killed_polite",
            Self::KilledForceful => "killed_forceful",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
