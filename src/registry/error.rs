//! Registry error definitions.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::module::ModuleFault;

/// The module entry point a fault came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Activate,
    Deactivate,
    ConfigChange,
    NewRequestHandler,
}

impl Hook {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Activate => "on_activate",
            Hook::Deactivate => "on_deactivate",
            Hook::ConfigChange => "on_config_change",
            Hook::NewRequestHandler => "new_request_handler",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the module registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A module with this name is already registered.
    #[error("module `{0}` is already registered")]
    DuplicateModuleName(String),

    /// No module with this name is registered.
    #[error("module `{0}` not found")]
    ModuleNotFound(String),

    /// The module exists but is not Active.
    #[error("module `{0}` is not active")]
    ModuleNotActive(String),

    /// Activation was requested for a module that is already Active.
    #[error("module `{0}` is already active")]
    AlreadyActive(String),

    /// The module faulted while producing a request handler.
    #[error("module `{module}` failed to create a request handler: {fault}")]
    HandlerCreationFailed { module: String, fault: ModuleFault },

    /// The module faulted inside a lifecycle hook.
    #[error("module `{module}` faulted in {hook}: {fault}")]
    Lifecycle {
        module: String,
        hook: Hook,
        fault: ModuleFault,
    },
}

impl RegistryError {
    /// The module fault behind this error, if module code raised one.
    pub fn fault(&self) -> Option<&ModuleFault> {
        match self {
            RegistryError::HandlerCreationFailed { fault, .. }
            | RegistryError::Lifecycle { fault, .. } => Some(fault),
            _ => None,
        }
    }
}
