//! Executor configuration.

use phasetrace_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Switches fixed when an [`Executor`](crate::Executor) is built.
///
/// Missing keys take their defaults: tracing off, validation on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Attach a timing report at `extensions.tracing`.
    pub tracing: bool,
    /// Validate documents before executing them.
    pub validate: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tracing: false,
            validate: true,
        }
    }
}

impl ExecutorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
}
