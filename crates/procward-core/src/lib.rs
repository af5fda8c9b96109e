#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod config;
pub mod lifecycle;
pub mod platform;
pub mod ports;
pub mod signal;

// Re-export commonly used types for convenience
pub use config::{
    BROKEN_STDIN_GRACE_PERIOD, DEFAULT_GRACE_PERIOD_MS, GRACE_PERIOD_ENV_VAR, SupervisorConfig,
};
pub use lifecycle::LifecycleState;
pub use platform::Platform;
pub use ports::{
    ChildControl, ConfigError, KillTreeError, OutputSink, ProcessTreeKiller, SpawnError,
};
pub use signal::TerminationSignal;

#[cfg(any(test, feature = "test-utils"))]
pub use ports::{MockChildControl, MockProcessTreeKiller};
