//! Host platform families that need different process handling.

use serde::{Deserialize, Serialize};

/// Platform family for process-tree and argument handling.
///
/// Code that branches on the platform takes this as a value instead of using
/// `cfg` inline, so both branches stay testable on any host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    /// Platform this binary was compiled for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    #[must_use]
    pub const fn is_windows(self) -> bool {
        matches!(self, Self::Windows)
    }
}
