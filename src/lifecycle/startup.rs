//! Session startup and teardown.
//!
//! # Responsibilities
//! - Load the route file (the only fatal step)
//! - Build counters, resolve ports, bind the router
//! - Start background tasks (stats, topology watchdog, route file watcher)
//! - On exit, stop tasks and release every port before returning
//!
//! # Design Decisions
//! - Ordered startup: routes, outputs, router, inputs, then watchers
//! - The watchdog baseline is taken after ports are open, so our own
//!   connections and virtual ports are part of it
//! - A session is single use; restarts build a new one from scratch

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::watcher::RoutesFileWatcher;
use crate::config::{load_routes, RouteConfig, RouterSettings};
use crate::error::Error;
use crate::lifecycle::restart::RestartReason;
use crate::lifecycle::shutdown::Shutdown;
use crate::midi::MidiBackend;
use crate::observability::{Stats, StatsCollector};
use crate::routing::{self, PortRegistry, Router};
use crate::topology::{self, TopologyWatchdog};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    Shutdown,
    Restart(RestartReason),
}

/// One running instance of the router: open ports plus background tasks.
pub struct Session {
    run_id: Uuid,
    config: Arc<RouteConfig>,
    router: Arc<Router>,
    registry: PortRegistry,
    shutdown: Shutdown,
    restart_tx: mpsc::UnboundedSender<RestartReason>,
    restart_rx: mpsc::UnboundedReceiver<RestartReason>,
    tasks: Vec<JoinHandle<()>>,
    routes_watcher: Option<RecommendedWatcher>,
}

/// Bring up a session.
///
/// Port enumeration runs inline; the watchdog's baseline snapshot may run an
/// external tool, so it is taken on the blocking pool.
pub async fn start_session(
    settings: &RouterSettings,
    backend: Arc<dyn MidiBackend>,
) -> Result<Session, Error> {
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, routes = %settings.routes_path.display(), "Starting routing session");

    let config = Arc::new(load_routes(&settings.routes_path)?);
    let stats = Arc::new(Stats::new(config.endpoint_ids()));

    let (router, registry) = routing::bind(
        backend.as_ref(),
        &config,
        stats.clone(),
        settings.virtual_fallback,
    );

    let shutdown = Shutdown::new();
    let (restart_tx, restart_rx) = mpsc::unbounded_channel();
    let mut tasks = Vec::new();

    if settings.stats.enabled {
        let collector = StatsCollector::new(stats, settings.stats.clone());
        tasks.push(tokio::spawn(collector.run(shutdown.subscribe())));
    }

    if settings.watchdog.enabled {
        let source = topology::source_from_config(&settings.watchdog, backend.clone());
        match tokio::task::spawn_blocking(move || TopologyWatchdog::new(source)).await {
            Ok(watchdog) => tasks.push(tokio::spawn(watchdog.run(
                Duration::from_secs(settings.watchdog.interval_secs),
                restart_tx.clone(),
                shutdown.subscribe(),
            ))),
            Err(e) => tracing::error!(error = %e, "Topology baseline task failed, watchdog not started"),
        }
    } else {
        tracing::info!("Topology watchdog disabled");
    }

    let routes_watcher = if settings.watchdog.watch_routes_file {
        match RoutesFileWatcher::new(&settings.routes_path, restart_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Route file watcher unavailable");
                None
            }
        }
    } else {
        None
    };

    tracing::info!(%run_id, "MIDI routing is active");

    Ok(Session {
        run_id,
        config,
        router,
        registry,
        shutdown,
        restart_tx,
        restart_rx,
        tasks,
        routes_watcher,
    })
}

impl Session {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &Arc<RouteConfig> {
        &self.config
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    /// Handle for requesting a restart from outside the session.
    pub fn restart_handle(&self) -> mpsc::UnboundedSender<RestartReason> {
        self.restart_tx.clone()
    }

    /// Route until `stop` resolves or a restart is requested, then tear
    /// down. Ports are released before this returns.
    pub async fn run_until<F>(mut self, stop: F) -> SessionExit
    where
        F: Future,
        F::Output: std::fmt::Display,
    {
        let exit = tokio::select! {
            reason = self.restart_rx.recv() => match reason {
                Some(reason) => {
                    tracing::warn!(run_id = %self.run_id, %reason, "Restart requested");
                    SessionExit::Restart(reason)
                }
                None => SessionExit::Shutdown,
            },
            signal = stop => {
                tracing::info!(run_id = %self.run_id, %signal, "Shutdown requested");
                SessionExit::Shutdown
            }
        };

        self.stop().await;
        exit
    }

    /// Stop background tasks and release every port. Returns the number of
    /// handles closed.
    pub async fn stop(&mut self) -> usize {
        self.shutdown.trigger();
        self.routes_watcher = None;

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Session task ended abnormally");
            }
        }

        self.registry.release()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Covers exits that skipped `stop`; the registry closes its own ports
        self.shutdown.trigger();
        for task in &self.tasks {
            task.abort();
        }
    }
}
