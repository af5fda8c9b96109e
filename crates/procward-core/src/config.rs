//! Supervisor configuration.
//!
//! The grace period is the only tunable. It is serde-friendly so host
//! applications can embed it in their own settings, and it can be overridden
//! from the environment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ports::ConfigError;

/// Default wait between shutdown stages (10 seconds).
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;

/// Grace period used when closing stdin fails because the stream is already
/// broken. The next stage fires almost immediately.
pub const BROKEN_STDIN_GRACE_PERIOD: Duration = Duration::from_millis(1);

/// Environment variable overriding the grace period, in milliseconds.
pub const GRACE_PERIOD_ENV_VAR: &str = "PROCWARD_GRACE_PERIOD_MS";

/// Configuration for a `ProcessLifecycleSupervisor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Wait before each escalation step, in milliseconds.
    ///
    /// The worst-case time from `stop()` to a forceful kill is twice this.
    pub grace_period_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
        }
    }
}

impl SupervisorConfig {
    /// Set the grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Reject configurations that would skip the cooperative window entirely.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_ms == 0 {
            return Err(ConfigError::ZeroGracePeriod);
        }
        Ok(())
    }

    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(GRACE_PERIOD_ENV_VAR) {
            let trimmed = raw.trim();
            config.grace_period_ms = trimmed
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: GRACE_PERIOD_ENV_VAR,
                    value: trimmed.to_string(),
                    reason: e.to_string(),
                })?;
            tracing::debug!(
                grace_period_ms = config.grace_period_ms,
                "grace period overridden from environment"
            );
        }

        config.validate()?;
        Ok(config)
    }
}
