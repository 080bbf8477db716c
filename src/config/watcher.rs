//! Configuration file watcher for hot reload.
//!
//! # Design Decisions
//! - Watches the parent directory, not the file: editors that save by
//!   writing a temp file and renaming it over the config replace the inode,
//!   which would silently end a file-level watch
//! - Events are filtered by file name and debounced, so one save publishes
//!   one generation

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ServerConfig;

/// Quiet period after the last file event before the config is re-read.
const DEBOUNCE: Duration = Duration::from_millis(250);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<ServerConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ServerConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce: DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sender half, for pushing reloads from other sources (e.g. SIGHUP).
    pub fn sender(&self) -> mpsc::UnboundedSender<ServerConfig> {
        self.update_tx.clone()
    }

    /// Start watching the file.
    ///
    /// The returned watcher must be kept alive for events to keep flowing;
    /// dropping it also stops the reload thread.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let file_name: OsString = self
            .path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = std_mpsc::channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = (event.kind.is_modify() || event.kind.is_create())
                        && event
                            .paths
                            .iter()
                            .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if relevant {
                        let _ = event_tx.send(());
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        let path = self.path.clone();
        let debounce = self.debounce;
        let tx = self.update_tx;
        thread::Builder::new()
            .name("config-reload".into())
            .spawn(move || reload_loop(&path, debounce, &event_rx, &tx))
            .map_err(notify::Error::io)?;

        tracing::info!(path = ?self.path, dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}

/// Wait for a burst of file events to go quiet, then reload once.
///
/// Ends when the watcher (and with it the event sender) is dropped, or when
/// nobody listens for updates any more.
fn reload_loop(
    path: &Path,
    debounce: Duration,
    events: &std_mpsc::Receiver<()>,
    tx: &mpsc::UnboundedSender<ServerConfig>,
) {
    while events.recv().is_ok() {
        loop {
            match events.recv_timeout(debounce) {
                Ok(()) => continue,
                Err(std_mpsc::RecvTimeoutError::Timeout) => break,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => return,
            }
        }

        tracing::info!(path = ?path, "Config file change detected, reloading");
        match load_config(path) {
            Ok(new_config) => {
                if tx.send(new_config).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
            }
        }
    }
}
