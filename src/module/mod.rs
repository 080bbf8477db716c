//! Module contract subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig snapshot (Arc)
//!     → Module::on_activate / on_config_change
//!     → module keeps its own copy-on-write view of the settings it needs
//!
//! Incoming request
//!     → registry asks Module::new_request_handler
//!     → handler.rs (one RequestHandler per request, consumed by handle)
//! ```
//!
//! # Design Decisions
//! - Modules see only the `ServerConfig` read interface, never the registry
//! - Faults are returned as values; panics are caught by the registry
//! - Lifecycle hooks take `&mut self` (the registry serializes them),
//!   handler creation takes `&self` (called concurrently)

pub mod fault;
pub mod handler;
pub mod state;

use std::sync::Arc;

use crate::config::ServerConfig;

pub use fault::ModuleFault;
pub use handler::{HandlerRequest, HandlerResult, RequestHandler};
pub use state::ModuleState;

/// A pluggable server feature unit.
///
/// The registry guarantees that `on_deactivate`, `on_config_change` and
/// `new_request_handler` are only invoked while the module is Active, and
/// that no two lifecycle hooks run on the same module at once.
pub trait Module: Send + Sync + 'static {
    /// Immutable identity of the module. Must not have side effects.
    fn name(&self) -> &str;

    /// Acquire whatever the module needs to serve requests.
    ///
    /// On error the module is considered Inactive, so it must release
    /// anything it allocated before returning the fault.
    fn on_activate(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault>;

    /// Release everything acquired since activation.
    fn on_deactivate(&mut self) -> Result<(), ModuleFault>;

    /// Apply a new configuration snapshot.
    ///
    /// Handlers already issued keep the snapshot they captured. On error the
    /// module keeps its previous working configuration.
    fn on_config_change(&mut self, cfg: &Arc<ServerConfig>) -> Result<(), ModuleFault>;

    /// Produce a handler for one request. Must not block on I/O.
    fn new_request_handler(&self) -> Result<Box<dyn RequestHandler>, ModuleFault>;
}
