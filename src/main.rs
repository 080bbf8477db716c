//! module-host: an HTTP server whose features are pluggable modules.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     MODULE HOST                       │
//!                     │                                                       │
//!   Client Request    │  ┌─────────┐   ┌─────────┐   ┌────────────────────┐  │
//!   ──────────────────┼─▶│  http   │──▶│ routing │──▶│ registry           │  │
//!                     │  │ server  │   │ (module │   │ create_handler()   │  │
//!                     │  └─────────┘   │  name)  │   └─────────┬──────────┘  │
//!                     │                └─────────┘             │             │
//!                     │                                        ▼             │
//!   Client Response   │                              ┌────────────────────┐  │
//!   ◀─────────────────┼──────────────────────────────│  RequestHandler    │  │
//!                     │                              │  (one per request) │  │
//!                     │                              └────────────────────┘  │
//!                     │                                                       │
//!                     │  config (load/watch) ──▶ broadcast_config_change     │
//!                     │  lifecycle (signals) ──▶ activate_all / deactivate_all│
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use module_host::config::watcher::ConfigWatcher;
use module_host::config::{load_config, ServerConfig};
use module_host::lifecycle::{signals, Shutdown};
use module_host::observability::{logging, metrics};
use module_host::{modules, HttpServer, ModuleRegistry};

#[derive(Parser)]
#[command(name = "module-host")]
#[command(about = "Extensible HTTP server hosting pluggable modules", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not watch the configuration file (SIGHUP still reloads it).
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability);

    tracing::info!("module-host v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        request_timeout_secs = config.timeouts.request_secs,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let registry = Arc::new(ModuleRegistry::new());
    modules::register_builtin(&registry)?;

    // Reload sources: file watcher and SIGHUP, both only with a config file.
    let (config_updates, _watcher, _updates_tx) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            signals::spawn_reload_on_hangup(path.clone(), watcher.sender());
            let guard = if cli.no_watch {
                None
            } else {
                Some(watcher.run()?)
            };
            (updates, guard, None)
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (rx, None, Some(tx))
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_on_signal(&signal_shutdown).await;
    });

    let server = HttpServer::new(config, registry);
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
