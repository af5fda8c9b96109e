//! Port definitions (trait abstractions) for OS-facing collaborators.
//!
//! The supervisor state machine only talks to these traits. Concrete
//! implementations that spawn processes and run OS tools live in
//! `procward-runtime`.
//!
//! # Design Rules
//!
//! - No Tokio process types in any signature
//! - Platform differences are expressed by implementations, not by callers
//! - Kill operations are one-shot; escalation policy lives in the supervisor

pub mod child_control;
pub mod error;
pub mod output_sink;
pub mod tree_killer;

pub use child_control::ChildControl;
pub use error::{ConfigError, KillTreeError, SpawnError};
pub use output_sink::OutputSink;
pub use tree_killer::ProcessTreeKiller;

#[cfg(any(test, feature = "test-utils"))]
pub use child_control::MockChildControl;
#[cfg(any(test, feature = "test-utils"))]
pub use tree_killer::MockProcessTreeKiller;
