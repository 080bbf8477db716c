//! Module registry and lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     register(module)*  → activate_all(cfg)    (registration order)
//!
//! Request path:
//!     create_handler(name)
//!         → manager.rs (lookup, no registry-wide lock)
//!         → slot.rs (state check under read lock)
//!         → guard.rs (catch faults and panics)
//!         → Module::new_request_handler
//!
//! Reload:
//!     broadcast_config_change(cfg)                (Active modules only)
//!
//! Shutdown:
//!     deactivate_all()                            (reverse registration order)
//! ```
//!
//! # Design Decisions
//! - Module code never unwinds past the registry: faults and panics become
//!   `RegistryError` values
//! - Batch operations keep going past per-module failures and return a
//!   `LifecycleReport`
//! - A module whose deactivation faults is still considered Inactive

pub mod error;
pub mod guard;
pub mod manager;
pub mod report;
mod slot;

pub use error::{Hook, RegistryError};
pub use manager::ModuleRegistry;
pub use report::{LifecycleReport, ModuleFailure};
pub use slot::{ModuleStatus, RecordedFault};
