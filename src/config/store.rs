//! Current configuration snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::ServerConfig;

/// Holds the live `ServerConfig` and versions every published snapshot.
///
/// Readers get an `Arc` to the snapshot that was current when they looked;
/// publishing a new one never mutates snapshots already handed out.
pub struct ConfigStore {
    current: ArcSwap<ServerConfig>,
    next_generation: AtomicU64,
}

impl ConfigStore {
    /// Create a store whose first snapshot is generation 1.
    pub fn new(mut initial: ServerConfig) -> Self {
        initial.generation = 1;
        Self {
            current: ArcSwap::from_pointee(initial),
            next_generation: AtomicU64::new(2),
        }
    }

    /// The snapshot currently in effect.
    pub fn current(&self) -> Arc<ServerConfig> {
        self.current.load_full()
    }

    /// Stamp `config` with the next generation and make it current.
    pub fn publish(&self, mut config: ServerConfig) -> Arc<ServerConfig> {
        config.generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let snapshot = Arc::new(config);
        self.current.store(snapshot.clone());
        tracing::info!(generation = snapshot.generation, "Configuration published");
        snapshot
    }
}
