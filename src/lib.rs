//! Extensible HTTP server core: pluggable modules with a managed lifecycle.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod module;
pub mod modules;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use module::{Module, ModuleFault, ModuleState, RequestHandler};
pub use registry::{LifecycleReport, ModuleRegistry, RegistryError};
