//! Admin API: module introspection and single-module lifecycle control.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/modules", get(get_modules))
        .route("/admin/modules/{name}/activate", post(activate_module))
        .route("/admin/modules/{name}/deactivate", post(deactivate_module))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
