//! Built-in modules.
//!
//! - echo.rs: reflects the request back as text
//! - static_content.rs: serves a configured body
//! - status.rs: reports request counters, bounds in-flight handlers

pub mod echo;
pub mod static_content;
pub mod status;

use crate::module::Module;
use crate::registry::{ModuleRegistry, RegistryError};

pub use echo::EchoModule;
pub use static_content::StaticModule;
pub use status::StatusModule;

/// Fresh, Inactive instances of every built-in module.
pub fn builtin() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(EchoModule::new()),
        Box::new(StaticModule::new()),
        Box::new(StatusModule::new()),
    ]
}

/// Register every built-in module with `registry`.
pub fn register_builtin(registry: &ModuleRegistry) -> Result<(), RegistryError> {
    for module in builtin() {
        registry.register(module)?;
    }
    Ok(())
}
