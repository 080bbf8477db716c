//! Per-module bookkeeping and the lifecycle state machine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::config::ServerConfig;
use crate::module::state::AtomicModuleState;
use crate::module::{Module, ModuleFault, ModuleState, RequestHandler};
use crate::observability::metrics;
use crate::registry::error::{Hook, RegistryError};
use crate::registry::guard::contain;

/// Point-in-time view of one registered module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    /// Number of successful activations over the module's lifetime.
    pub activations: u64,
    pub handlers_created: u64,
    /// Generation of the config snapshot the module last accepted (0 = never).
    pub config_generation: u64,
    pub last_fault: Option<RecordedFault>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedFault {
    pub hook: Hook,
    pub message: String,
}

/// A registered module plus the state the registry tracks for it.
///
/// Lifecycle hooks take the write side of `module`, which gives mutual
/// exclusion per module. Handler creation takes the read side, so it runs
/// concurrently with itself and never observes a half-finished transition.
pub(crate) struct ModuleSlot {
    name: String,
    module: RwLock<Box<dyn Module>>,
    state: AtomicModuleState,
    activations: AtomicU64,
    handlers_created: AtomicU64,
    config_generation: AtomicU64,
    last_fault: Mutex<Option<RecordedFault>>,
}

impl ModuleSlot {
    pub(crate) fn new(name: String, module: Box<dyn Module>) -> Self {
        Self {
            name,
            module: RwLock::new(module),
            state: AtomicModuleState::default(),
            activations: AtomicU64::new(0),
            handlers_created: AtomicU64::new(0),
            config_generation: AtomicU64::new(0),
            last_fault: Mutex::new(None),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> ModuleState {
        self.state.load()
    }

    // Hooks run inside `contain`, so a module panic never poisons these
    // locks; recovering the guard covers panics elsewhere.
    fn read(&self) -> RwLockReadGuard<'_, Box<dyn Module>> {
        self.module.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Module>> {
        self.module.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inactive → Active.
    pub(crate) fn activate(&self, cfg: &Arc<ServerConfig>) -> Result<(), RegistryError> {
        self.activate_with(|| cfg.clone())
    }

    /// Inactive → Active with the snapshot `current` returns once the write
    /// lock is held. A reload that publishes while the slot is contended is
    /// either picked up here or delivered by its broadcast afterwards.
    pub(crate) fn activate_with(
        &self,
        current: impl FnOnce() -> Arc<ServerConfig>,
    ) -> Result<(), RegistryError> {
        let mut module = self.write();
        if self.state.load() == ModuleState::Active {
            return Err(RegistryError::AlreadyActive(self.name.clone()));
        }

        let cfg = &current();
        match contain(|| module.on_activate(cfg)) {
            Ok(()) => {
                self.state.store(ModuleState::Active);
                self.activations.fetch_add(1, Ordering::Relaxed);
                self.config_generation.store(cfg.generation, Ordering::Relaxed);
                tracing::info!(module = %self.name, generation = cfg.generation, "Module activated");
                Ok(())
            }
            Err(fault) => {
                tracing::error!(module = %self.name, error = %fault, "Module activation failed, leaving it inactive");
                Err(self.fault(Hook::Activate, fault))
            }
        }
    }

    /// Active → Inactive.
    ///
    /// The module is Inactive afterwards even if its hook faults; the fault
    /// is reported and never retried.
    pub(crate) fn deactivate(&self) -> Result<(), RegistryError> {
        let mut module = self.write();
        if self.state.load() != ModuleState::Active {
            return Err(RegistryError::ModuleNotActive(self.name.clone()));
        }

        let outcome = contain(|| module.on_deactivate());
        self.state.store(ModuleState::Inactive);

        match outcome {
            Ok(()) => {
                tracing::info!(module = %self.name, "Module deactivated");
                Ok(())
            }
            Err(fault) => {
                tracing::warn!(module = %self.name, error = %fault, "Module faulted during deactivation");
                Err(self.fault(Hook::Deactivate, fault))
            }
        }
    }

    /// Active → Active with a new snapshot.
    pub(crate) fn config_change(&self, cfg: &Arc<ServerConfig>) -> Result<(), RegistryError> {
        let mut module = self.write();
        if self.state.load() != ModuleState::Active {
            return Err(RegistryError::ModuleNotActive(self.name.clone()));
        }

        match contain(|| module.on_config_change(cfg)) {
            Ok(()) => {
                self.config_generation.store(cfg.generation, Ordering::Relaxed);
                tracing::info!(module = %self.name, generation = cfg.generation, "Module accepted new configuration");
                Ok(())
            }
            Err(fault) => {
                tracing::error!(
                    module = %self.name,
                    generation = cfg.generation,
                    error = %fault,
                    "Module rejected new configuration, keeping previous one"
                );
                Err(self.fault(Hook::ConfigChange, fault))
            }
        }
    }

    /// Ask an Active module for a request handler.
    pub(crate) fn create_handler(&self) -> Result<Box<dyn RequestHandler>, RegistryError> {
        let module = self.read();
        if self.state.load() != ModuleState::Active {
            return Err(RegistryError::ModuleNotActive(self.name.clone()));
        }

        match contain(|| module.new_request_handler()) {
            Ok(handler) => {
                self.handlers_created.fetch_add(1, Ordering::Relaxed);
                metrics::record_handler_created(&self.name);
                tracing::trace!(module = %self.name, "Request handler created");
                Ok(handler)
            }
            Err(fault) => {
                tracing::warn!(module = %self.name, error = %fault, "Request handler creation failed");
                self.remember(Hook::NewRequestHandler, &fault);
                Err(RegistryError::HandlerCreationFailed {
                    module: self.name.clone(),
                    fault,
                })
            }
        }
    }

    pub(crate) fn status(&self) -> ModuleStatus {
        ModuleStatus {
            name: self.name.clone(),
            state: self.state.load(),
            activations: self.activations.load(Ordering::Relaxed),
            handlers_created: self.handlers_created.load(Ordering::Relaxed),
            config_generation: self.config_generation.load(Ordering::Relaxed),
            last_fault: self
                .last_fault
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn fault(&self, hook: Hook, fault: ModuleFault) -> RegistryError {
        self.remember(hook, &fault);
        RegistryError::Lifecycle {
            module: self.name.clone(),
            hook,
            fault,
        }
    }

    fn remember(&self, hook: Hook, fault: &ModuleFault) {
        metrics::record_module_fault(&self.name, hook.as_str());
        *self.last_fault.lock().unwrap_or_else(PoisonError::into_inner) = Some(RecordedFault {
            hook,
            message: fault.to_string(),
        });
    }
}
