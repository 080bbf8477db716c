//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the dispatch handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Activate modules before serving, deactivate them after
//! - Dispatch requests: route → registry handler → drive handler
//! - Apply configuration reloads (publish, re-route, broadcast)
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigStore, ServerConfig};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response;
use crate::observability::metrics;
use crate::registry::{guard, LifecycleReport, ModuleRegistry};
use crate::routing::Router as ModuleRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModuleRegistry>,
    pub config: Arc<ConfigStore>,
    pub router: Arc<ArcSwap<ModuleRouter>>,
    in_flight: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ServerConfig, registry: Arc<ModuleRegistry>) -> Self {
        let router = ModuleRouter::from_config(&config.routes);
        // Configs built in code skip validation; keep the semaphore constructible.
        let permits = config.listener.max_connections.clamp(1, Semaphore::MAX_PERMITS);
        let in_flight = Arc::new(Semaphore::new(permits));
        Self {
            registry,
            config: Arc::new(ConfigStore::new(config)),
            router: Arc::new(ArcSwap::from_pointee(router)),
            in_flight,
        }
    }

    /// Publish a reloaded configuration and hand it to every active module.
    ///
    /// Requests already dispatched keep the router and snapshot they started
    /// with. Listener and timeout changes only take effect on restart.
    pub fn apply_config(&self, config: ServerConfig) -> LifecycleReport {
        let snapshot = self.config.publish(config);
        self.router
            .store(Arc::new(ModuleRouter::from_config(&snapshot.routes)));

        let report = self.registry.broadcast_config_change(&snapshot);
        for failure in &report.failed {
            tracing::error!(
                module = %failure.module,
                generation = snapshot.generation,
                error = %failure.fault,
                "Module kept its previous configuration"
            );
        }
        report
    }
}

/// HTTP server hosting the registered modules.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and modules.
    pub fn new(config: ServerConfig, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            state: AppState::new(config, registry),
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn app(&self) -> Router {
        let config = self.state.config.current();
        Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Modules are activated before the listener starts serving and
    /// deactivated (in reverse order) once the listener, the admin API and
    /// the reload task have all stopped, so no admin action or reload can
    /// touch a module after teardown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let config = self.state.config.current();

        let report = self.state.registry.activate_all(&config);
        for failure in &report.failed {
            tracing::error!(
                module = %failure.module,
                error = %failure.fault,
                "Module failed to activate, its routes will answer 503"
            );
        }

        let mut admin = None;
        if config.admin.enabled {
            let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
            let admin_app = crate::admin::setup_admin_router(self.state.clone());
            let mut admin_shutdown = shutdown.resubscribe();
            tracing::info!(address = %config.admin.bind_address, "Admin API starting");
            admin = Some(tokio::spawn(async move {
                let served = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            }));
        }

        let reload_state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        let reloader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => {
                            reload_state.apply_config(config);
                        }
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        tracing::info!(address = %addr, modules = self.state.registry.len(), "HTTP server starting");

        let served = axum::serve(listener, self.app())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        // Reloads are synchronous between await points, so an aborted
        // reloader has either applied a config fully or not at all.
        reloader.abort();
        let _ = reloader.await;

        if let Some(admin) = admin {
            // Without a shutdown signal the admin server would never drain.
            if served.is_err() {
                admin.abort();
            }
            let _ = admin.await;
            tracing::info!("Admin API stopped");
        }

        self.state.registry.deactivate_all();

        tracing::info!("HTTP server stopped");
        served
    }
}

/// Route the request to a module, obtain a handler and drive it.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts).to_string();

    let Some(module) = state
        .router
        .load()
        .match_request(&parts)
        .map(|route| route.module.clone())
    else {
        tracing::warn!(request_id = %request_id, path = %parts.uri.path(), "No route matched");
        metrics::record_request("none", 404, start_time);
        return response::no_route();
    };

    // Backpressure: wait for a slot rather than reject.
    let _permit = match state.in_flight.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return response::handler_fault(),
    };

    tracing::debug!(
        request_id = %request_id,
        module = %module,
        method = %parts.method,
        path = %parts.uri.path(),
        "Dispatching request"
    );

    let handler = match state.registry.create_handler(&module) {
        Ok(handler) => handler,
        Err(e) => {
            tracing::warn!(request_id = %request_id, module = %module, error = %e, "No handler available");
            let response = response::registry_error(&e);
            metrics::record_request(&module, response.status().as_u16(), start_time);
            return response;
        }
    };

    let limit = state.config.current().timeouts.max_body_bytes;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, module = %module, error = %e, "Failed to read request body");
            metrics::record_request(&module, 413, start_time);
            return response::payload_too_large();
        }
    };

    let response = match guard::drive(handler, Request::from_parts(parts, body)).await {
        Ok(response) => response.into_response(),
        Err(fault) => {
            tracing::error!(request_id = %request_id, module = %module, error = %fault, "Request handler faulted");
            response::handler_fault()
        }
    };

    metrics::record_request(&module, response.status().as_u16(), start_time);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;
    use crate::modules;
    use axum::body::to_bytes;
    use tower::ServiceExt;

    fn config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.routes.push(RouteConfig {
            name: "hello".into(),
            host: None,
            path_prefix: Some("/hello".into()),
            module: "static".into(),
            priority: 0,
        });
        config.routes.push(RouteConfig {
            name: "ghost".into(),
            host: None,
            path_prefix: Some("/ghost".into()),
            module: "ghost".into(),
            priority: 0,
        });
        config
            .modules
            .insert("static".into(), toml::from_str(r#"body = "hello""#).unwrap());
        config
    }

    fn server() -> HttpServer {
        let registry = Arc::new(ModuleRegistry::new());
        modules::register_builtin(&registry).unwrap();
        HttpServer::new(config(), registry)
    }

    async fn get(app: Router, path: &str) -> (u16, String) {
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn inactive_module_answers_503() {
        let server = server();
        let (status, _) = get(server.app(), "/hello").await;
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn dispatches_to_active_module() {
        let server = server();
        let state = server.state();
        state.registry.activate_all(&state.config.current());

        assert_eq!(get(server.app(), "/hello").await, (200, "hello".to_string()));
        assert_eq!(get(server.app(), "/nowhere").await.0, 404);
        assert_eq!(get(server.app(), "/ghost").await.0, 502);
    }

    #[test]
    fn oversized_connection_limit_does_not_panic() {
        let mut config = config();
        config.listener.max_connections = usize::MAX;
        let state = AppState::new(config, Arc::new(ModuleRegistry::new()));
        assert_eq!(state.in_flight.available_permits(), Semaphore::MAX_PERMITS);
    }

    #[tokio::test]
    async fn reload_reaches_modules_and_routes() {
        let server = server();
        let state = server.state();
        state.registry.activate_all(&state.config.current());

        let mut next = config();
        next.routes[0].path_prefix = Some("/greeting".into());
        next.modules
            .insert("static".into(), toml::from_str(r#"body = "bonjour""#).unwrap());
        let report = state.apply_config(next);

        assert!(report.is_clean());
        assert_eq!(state.config.current().generation, 2);
        assert_eq!(get(server.app(), "/greeting").await, (200, "bonjour".to_string()));
        assert_eq!(get(server.app(), "/hello").await.0, 404);
    }
}
