//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration for the module host.
///
/// A `ServerConfig` is an immutable snapshot: once published it is shared
/// through `Arc` and never mutated. A reload produces a new instance with a
/// higher `generation`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Snapshot generation, assigned by the config store on publish.
    #[serde(skip)]
    pub generation: u64,

    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Timeout and size limits.
    pub timeouts: TimeoutConfig,

    /// Route definitions mapping requests to modules.
    pub routes: Vec<RouteConfig>,

    /// Module-specific settings, keyed by module name.
    pub modules: BTreeMap<String, toml::Table>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Error returned when a module's settings table does not match its schema.
#[derive(Debug, Error)]
#[error("invalid settings for module `{module}`: {source}")]
pub struct ModuleSettingsError {
    pub module: String,
    #[source]
    pub source: toml::de::Error,
}

impl ServerConfig {
    /// Raw settings table for a module, if the config has one.
    pub fn module_table(&self, module: &str) -> Option<&toml::Table> {
        self.modules.get(module)
    }

    /// Decode the settings table of `module` into `T`.
    ///
    /// A module without a `[modules.<name>]` section decodes from an empty
    /// table, so `T` fields with serde defaults still apply.
    pub fn module_settings<T: DeserializeOwned>(&self, module: &str) -> Result<T, ModuleSettingsError> {
        let table = self.modules.get(module).cloned().unwrap_or_default();
        toml::Value::Table(table)
            .try_into()
            .map_err(|source| ModuleSettingsError {
                module: module.to_string(),
                source,
            })
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Route configuration mapping requests to a module.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Name of the module that serves this route.
    pub module: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_format: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
