//! Host-driven lifecycle calls: environment injection, migration, version.

use tracing::{debug, info, warn};

use crate::config::PluginInfo;

/// One environment variable pushed by the host through `Init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    /// Hidden values are never logged.
    pub hidden: bool,
    pub system: bool,
}

impl EnvVar {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            hidden: false,
            system: false,
        }
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Outcome of a lifecycle call, mirrored onto the wire `StatusResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleStatus {
    pub success: bool,
    pub message: String,
}

impl LifecycleStatus {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Handles `Init`, `Migration`, and `GetVersion`.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    info: PluginInfo,
}

impl LifecycleController {
    #[must_use]
    pub fn new(info: PluginInfo) -> Self {
        Self { info }
    }

    /// Applies `env_vars` to the process environment.
    ///
    /// Every entry is validated before any is applied, so a rejected batch
    /// leaves the environment untouched. Never panics.
    pub fn init(&self, env_vars: &[EnvVar]) -> LifecycleStatus {
        if let Some(problem) = env_vars.iter().find_map(invalid_reason) {
            warn!(reason = %problem, "rejecting init environment");
            return LifecycleStatus::failed(format!("failed to apply environment: {problem}"));
        }

        for var in env_vars {
            if var.hidden {
                debug!(key = %var.key, "setting environment variable (hidden)");
            } else {
                debug!(key = %var.key, value = %var.value, "setting environment variable");
            }
            // Unsound if another thread reads the environment concurrently.
            // The host sends Init before any Execute.
            std::env::set_var(&var.key, &var.value);
        }

        info!(count = env_vars.len(), "plugin initialized");
        LifecycleStatus::ok(format!(
            "initialized with {} environment variable(s)",
            env_vars.len()
        ))
    }

    /// Placeholder kept for host symmetry; always succeeds.
    #[must_use]
    pub fn migration(&self) -> LifecycleStatus {
        debug!("migration requested; nothing to do");
        LifecycleStatus::ok("no migrations")
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.info.version
    }
}

fn invalid_reason(var: &EnvVar) -> Option<String> {
    if var.key.is_empty() {
        Some("empty variable name".to_string())
    } else if var.key.contains(['=', '\0']) {
        Some(format!("invalid variable name '{}'", var.key.escape_default()))
    } else if var.value.contains('\0') {
        Some(format!("value of '{}' contains a NUL byte", var.key))
    } else {
        None
    }
}
