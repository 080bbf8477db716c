//! The module registry and lifecycle manager.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::{ConfigStore, ServerConfig};
use crate::module::{Module, ModuleState, RequestHandler};
use crate::observability::metrics;
use crate::registry::error::{Hook, RegistryError};
use crate::registry::report::LifecycleReport;
use crate::registry::slot::{ModuleSlot, ModuleStatus};

/// Owns every registered module and mediates all calls into them.
///
/// Lookups for handler creation go through a concurrent map and never take a
/// registry-wide lock. Batch lifecycle operations walk the registration
/// order list.
#[derive(Default)]
pub struct ModuleRegistry {
    index: DashMap<String, Arc<ModuleSlot>>,
    order: RwLock<Vec<Arc<ModuleSlot>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under its own name. The module starts Inactive.
    pub fn register(&self, module: Box<dyn Module>) -> Result<(), RegistryError> {
        let name = module.name().to_string();
        // Held across the map insert so registration order matches index order.
        let mut order = self.order.write().unwrap_or_else(PoisonError::into_inner);

        match self.index.entry(name.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!(module = %name, "Rejected duplicate module registration");
                Err(RegistryError::DuplicateModuleName(name))
            }
            Entry::Vacant(entry) => {
                let slot = Arc::new(ModuleSlot::new(name.clone(), module));
                entry.insert(slot.clone());
                order.push(slot);
                tracing::info!(module = %name, position = order.len(), "Module registered");
                Ok(())
            }
        }
    }

    /// Activate every Inactive module, in registration order.
    ///
    /// A module whose activation faults stays Inactive and is listed in the
    /// report; the remaining modules are still activated.
    pub fn activate_all(&self, cfg: &Arc<ServerConfig>) -> LifecycleReport {
        let mut report = LifecycleReport::new(Hook::Activate);
        for slot in self.ordered() {
            report.record(slot.name(), slot.activate(cfg));
        }
        self.finish("activate_all", &report);
        report
    }

    /// Deliver a new snapshot to every Active module.
    pub fn broadcast_config_change(&self, cfg: &Arc<ServerConfig>) -> LifecycleReport {
        let mut report = LifecycleReport::new(Hook::ConfigChange);
        for slot in self.ordered() {
            report.record(slot.name(), slot.config_change(cfg));
        }
        self.finish("broadcast_config_change", &report);
        report
    }

    /// Deactivate every Active module, in reverse registration order.
    pub fn deactivate_all(&self) -> LifecycleReport {
        let mut report = LifecycleReport::new(Hook::Deactivate);
        for slot in self.ordered().iter().rev() {
            report.record(slot.name(), slot.deactivate());
        }
        self.finish("deactivate_all", &report);
        report
    }

    /// Obtain a request handler from the named module.
    ///
    /// Safe to call from many tasks at once.
    pub fn create_handler(&self, name: &str) -> Result<Box<dyn RequestHandler>, RegistryError> {
        self.slot(name)?.create_handler()
    }

    /// Activate a single Inactive module.
    pub fn activate(&self, name: &str, cfg: &Arc<ServerConfig>) -> Result<(), RegistryError> {
        let result = self.slot(name)?.activate(cfg);
        metrics::set_active_modules(self.active_count());
        result
    }

    /// Activate a single Inactive module on the store's latest snapshot.
    ///
    /// The snapshot is read under the module's lifecycle lock, so a reload
    /// racing with this call can never leave the module on an older one.
    pub fn activate_current(&self, name: &str, store: &ConfigStore) -> Result<(), RegistryError> {
        let result = self.slot(name)?.activate_with(|| store.current());
        metrics::set_active_modules(self.active_count());
        result
    }

    /// Deactivate a single Active module.
    pub fn deactivate(&self, name: &str) -> Result<(), RegistryError> {
        let result = self.slot(name)?.deactivate();
        metrics::set_active_modules(self.active_count());
        result
    }

    /// Current lifecycle state of a module, if registered.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.index.get(name).map(|slot| slot.state())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Registered module names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.ordered().iter().map(|slot| slot.name().to_string()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.ordered()
            .iter()
            .filter(|slot| slot.state() == ModuleState::Active)
            .count()
    }

    /// Status of every module, in registration order.
    pub fn snapshot(&self) -> Vec<ModuleStatus> {
        self.ordered().iter().map(|slot| slot.status()).collect()
    }

    fn slot(&self, name: &str) -> Result<Arc<ModuleSlot>, RegistryError> {
        self.index
            .get(name)
            .map(|slot| slot.value().clone())
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))
    }

    // Copy of the order list so hooks run without holding the registry lock.
    fn ordered(&self) -> Vec<Arc<ModuleSlot>> {
        self.order
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn finish(&self, operation: &'static str, report: &LifecycleReport) {
        let active = self.active_count();
        metrics::set_active_modules(active);

        if report.is_clean() {
            tracing::info!(
                operation,
                succeeded = report.succeeded.len(),
                skipped = report.skipped.len(),
                active,
                "Lifecycle operation complete"
            );
        } else {
            tracing::warn!(
                operation,
                succeeded = report.succeeded.len(),
                skipped = report.skipped.len(),
                failed = ?report.failed_modules(),
                active,
                "Lifecycle operation completed with module faults"
            );
        }
    }
}
