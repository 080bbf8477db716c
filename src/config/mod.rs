//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → store.rs (stamp generation, publish Arc<ServerConfig>)
//!     → handed to modules by reference
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → store.rs swaps in the new snapshot
//!     → registry broadcasts it to active modules
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Old snapshots stay valid for whoever still holds them
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, ListenerConfig, ModuleSettingsError, ObservabilityConfig, RouteConfig,
    ServerConfig, TimeoutConfig,
};
pub use store::ConfigStore;
