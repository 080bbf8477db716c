//! Errors raised by module code.

use thiserror::Error;

use crate::config::ModuleSettingsError;

/// A fault raised from inside a module during a lifecycle hook, handler
/// creation or request handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleFault {
    /// Settings required by the module are missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A resource the module needs could not be acquired.
    #[error("resource unavailable: {0}")]
    Resource(String),

    /// The module cannot service requests right now.
    #[error("module unavailable: {0}")]
    Unavailable(String),

    /// Any other module-internal failure.
    #[error("internal module error: {0}")]
    Internal(String),

    /// Module code panicked; the panic was caught at the registry boundary.
    #[error("module panicked: {0}")]
    Panicked(String),
}

impl ModuleFault {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Build a `Panicked` fault from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(msg)
    }
}

impl From<ModuleSettingsError> for ModuleFault {
    fn from(err: ModuleSettingsError) -> Self {
        Self::Config(err.to_string())
    }
}
