//! OS signal handling.
//!
//! - SIGTERM / SIGINT (Ctrl+C) trigger graceful shutdown
//! - SIGHUP reloads the configuration file, never shuts down

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::config::{load_config, ServerConfig};
use crate::lifecycle::Shutdown;

/// Wait for SIGINT or SIGTERM, then trigger `shutdown`.
pub async fn shutdown_on_signal(shutdown: &Shutdown) {
    wait_for_termination().await;
    shutdown.trigger();
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler, only Ctrl+C will stop the server");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received"),
        _ = term.recv() => tracing::info!("SIGTERM received"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Ctrl+C received");
}

/// Reload `path` on every SIGHUP and push valid configs into `updates`.
///
/// A file that fails to load is logged and the running configuration is kept.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(path: PathBuf, updates: mpsc::UnboundedSender<ServerConfig>) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };

        while hangup.recv().await.is_some() {
            tracing::info!(path = ?path, "SIGHUP received, reloading configuration");
            match load_config(&path) {
                Ok(config) => {
                    if updates.send(config).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                }
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_path: PathBuf, _updates: mpsc::UnboundedSender<ServerConfig>) {}
