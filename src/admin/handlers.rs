use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::registry::{ModuleStatus, RegistryError};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub config_generation: u64,
    pub modules: usize,
    pub active_modules: usize,
}

#[derive(Serialize)]
pub struct ActionResult {
    pub module: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let active = state.registry.active_count();
    let status = if active == state.registry.len() {
        "operational"
    } else {
        "degraded"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        config_generation: state.config.current().generation,
        modules: state.registry.len(),
        active_modules: active,
    })
}

pub async fn get_modules(State(state): State<AppState>) -> Json<Vec<ModuleStatus>> {
    Json(state.registry.snapshot())
}

pub async fn activate_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResult>) {
    let result = state.registry.activate_current(&name, &state.config);
    action_result(name.clone(), result)
}

pub async fn deactivate_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<ActionResult>) {
    action_result(name.clone(), state.registry.deactivate(&name))
}

fn action_result(module: String, result: Result<(), RegistryError>) -> (StatusCode, Json<ActionResult>) {
    let status = match &result {
        Ok(()) => StatusCode::OK,
        Err(RegistryError::ModuleNotFound(_)) => StatusCode::NOT_FOUND,
        Err(RegistryError::AlreadyActive(_)) | Err(RegistryError::ModuleNotActive(_)) => StatusCode::CONFLICT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ActionResult {
            module,
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }),
    )
}
