//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limit fits a semaphore, addresses parse)
//! - Detect duplicate route names and routes without a match condition
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Routes may name modules that are not registered; dispatch answers 502
//!   for those instead of rejecting the whole file

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: usize },

    #[error("duplicate route name `{0}`")]
    DuplicateRoute(String),

    #[error("route `{0}` has an empty module name")]
    EmptyModule(String),

    #[error("route `{0}` path prefix must start with '/'")]
    InvalidPathPrefix(String),
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(&mut errors, "metrics", &config.observability.metrics_address);
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.max_connections" });
    } else if config.listener.max_connections > Semaphore::MAX_PERMITS {
        errors.push(ValidationError::TooLarge {
            field: "listener.max_connections",
            max: Semaphore::MAX_PERMITS,
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "timeouts.request_secs" });
    }
    if config.timeouts.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue { field: "timeouts.max_body_bytes" });
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if !seen.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if route.module.trim().is_empty() {
            errors.push(ValidationError::EmptyModule(route.name.clone()));
        }
        if let Some(prefix) = &route.path_prefix {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::InvalidPathPrefix(route.name.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}
