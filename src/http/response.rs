//! Error responses for requests that never reach a handler, or whose
//! handler faulted.
//!
//! # Status Mapping
//! - No route: 404 Not Found
//! - Route names an unregistered module: 502 Bad Gateway
//! - Module inactive or refused to create a handler: 503 Service Unavailable
//! - Body over the configured limit: 413 Payload Too Large
//! - Handler fault (including panics): 500 Internal Server Error
//!
//! Bodies are short plain-text messages; fault details stay in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::registry::RegistryError;

/// Status code the dispatcher answers with when the registry refuses a handler.
pub fn status_for(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::ModuleNotFound(_) => StatusCode::BAD_GATEWAY,
        RegistryError::ModuleNotActive(_) | RegistryError::HandlerCreationFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn registry_error(err: &RegistryError) -> Response {
    let message = match err {
        RegistryError::ModuleNotFound(_) => "Module not available",
        RegistryError::ModuleNotActive(_) => "Module not active",
        RegistryError::HandlerCreationFailed { .. } => "Module cannot serve requests right now",
        _ => "Module error",
    };
    (status_for(err), message).into_response()
}

pub fn no_route() -> Response {
    (StatusCode::NOT_FOUND, "No matching route found").into_response()
}

pub fn payload_too_large() -> Response {
    (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
}

pub fn handler_fault() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Request handler failed").into_response()
}
