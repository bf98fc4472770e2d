//! Route file watcher.
//!
//! Routes are fixed for a process lifetime, so an edited route file is
//! handled like a topology change: the running instance asks to be restarted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::restart::RestartReason;

/// A watcher that monitors the route file for changes.
pub struct RoutesFileWatcher {
    path: PathBuf,
    restart_tx: mpsc::UnboundedSender<RestartReason>,
}

impl RoutesFileWatcher {
    pub fn new(path: &Path, restart_tx: mpsc::UnboundedSender<RestartReason>) -> Self {
        Self {
            path: path.to_path_buf(),
            restart_tx,
        }
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive; dropping it stops watching.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.restart_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                        tracing::info!(path = %path.display(), "Route file change detected, requesting restart");
                        let _ = tx.send(RestartReason::RoutesFileChanged);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route file watcher started");
        Ok(watcher)
    }
}
