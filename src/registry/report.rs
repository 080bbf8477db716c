//! Aggregate outcome of a batch lifecycle operation.

use serde::Serialize;

use crate::module::ModuleFault;
use crate::registry::error::{Hook, RegistryError};

/// One module that failed during a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleFailure {
    pub module: String,
    #[serde(serialize_with = "serialize_fault")]
    pub fault: ModuleFault,
}

fn serialize_fault<S: serde::Serializer>(fault: &ModuleFault, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(fault)
}

/// Which modules a batch operation touched and how each one fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub hook: Hook,
    /// Modules whose hook ran and succeeded, in invocation order.
    pub succeeded: Vec<String>,
    /// Modules left alone because they were not in the required state.
    pub skipped: Vec<String>,
    /// Modules whose hook faulted.
    pub failed: Vec<ModuleFailure>,
}

impl LifecycleReport {
    pub fn new(hook: Hook) -> Self {
        Self {
            hook,
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// True if no module faulted.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Names of the modules that faulted.
    pub fn failed_modules(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.module.as_str()).collect()
    }

    /// Number of modules whose hook was actually invoked.
    pub fn invoked(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub(crate) fn record(&mut self, module: &str, outcome: Result<(), RegistryError>) {
        match outcome {
            Ok(()) => self.succeeded.push(module.to_string()),
            Err(RegistryError::Lifecycle { fault, .. }) => self.failed.push(ModuleFailure {
                module: module.to_string(),
                fault,
            }),
            Err(_) => self.skipped.push(module.to_string()),
        }
    }
}
