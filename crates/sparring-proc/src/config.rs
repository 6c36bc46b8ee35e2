use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Time a child gets between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2000;

/// Time the waiter gives the pumps to drain after the child exits.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 1000;

/// How sessions launch and tear down their child process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Hand the command string to the platform shell instead of splitting it
    /// on whitespace. Off by default, so a missing program is a launch error
    /// rather than a shell exiting with 127.
    pub shell: bool,
    /// Working directory for the child. Inherits ours when unset.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,
    pub grace_period_ms: u64,
    pub drain_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shell: false,
            working_dir: None,
            env: BTreeMap::new(),
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

impl SessionConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }
}
