//! Topology watchdog state machine.
//!
//! # States
//! - Monitoring: snapshots match the baseline
//! - Restarting: a differing snapshot was seen (terminal for this instance)
//!
//! # State Transitions
//! ```text
//! Monitoring → Monitoring: snapshot == baseline, or the probe failed
//! Monitoring → Restarting: snapshot != baseline (byte-for-byte)
//! Restarting → Restarting: no further probes
//! ```
//!
//! A failed probe is not a change. If the startup snapshot fails, the first
//! successful one becomes the baseline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time;

use crate::lifecycle::restart::RestartReason;
use crate::topology::source::{TopologyError, TopologySnapshot, TopologySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Monitoring,
    Restarting,
}

/// Detects topology changes by comparing successive snapshots.
pub struct TopologyWatchdog {
    source: Arc<dyn TopologySource>,
    baseline: Option<TopologySnapshot>,
    state: WatchdogState,
}

impl TopologyWatchdog {
    /// Take the initial snapshot and start monitoring.
    pub fn new(source: Arc<dyn TopologySource>) -> Self {
        let baseline = match source.snapshot() {
            Ok(snapshot) => {
                tracing::debug!(bytes = snapshot.len(), "Initial topology snapshot taken");
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Initial topology snapshot failed");
                None
            }
        };

        Self {
            source,
            baseline,
            state: WatchdogState::Monitoring,
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Probe once and update state.
    pub fn check(&mut self) -> WatchdogState {
        if self.state == WatchdogState::Restarting {
            return self.state;
        }
        let probe = self.source.snapshot();
        self.observe(probe)
    }

    /// Feed one probe result into the state machine.
    pub fn observe(&mut self, probe: Result<TopologySnapshot, TopologyError>) -> WatchdogState {
        if self.state == WatchdogState::Restarting {
            return self.state;
        }

        match (probe, &self.baseline) {
            (Err(e), _) => {
                tracing::warn!(error = %e, "Topology probe failed, keeping current state");
            }
            (Ok(snapshot), None) => {
                tracing::debug!(bytes = snapshot.len(), "Topology baseline established");
                self.baseline = Some(snapshot);
            }
            (Ok(snapshot), Some(baseline)) if snapshot == *baseline => {}
            (Ok(snapshot), Some(baseline)) => {
                tracing::info!(
                    previous_bytes = baseline.len(),
                    current_bytes = snapshot.len(),
                    "MIDI topology changed"
                );
                tracing::debug!(previous = %baseline, current = %snapshot, "Topology snapshots");
                self.state = WatchdogState::Restarting;
            }
        }
        self.state
    }

    /// Probe every `interval` until a change is seen or shutdown is
    /// signalled. Sends exactly one restart request on change.
    pub async fn run(
        mut self,
        interval: Duration,
        restart_tx: mpsc::UnboundedSender<RestartReason>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(interval_secs = interval.as_secs(), "Topology watchdog starting");

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let source = Arc::clone(&self.source);
                    let probe = match tokio::task::spawn_blocking(move || source.snapshot()).await {
                        Ok(probe) => probe,
                        Err(e) => {
                            tracing::error!(error = %e, "Topology probe task failed");
                            continue;
                        }
                    };

                    if self.observe(probe) == WatchdogState::Restarting {
                        tracing::warn!("Topology change detected, restarting");
                        let _ = restart_tx.send(RestartReason::TopologyChanged);
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Topology watchdog received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of snapshots, repeating the last one.
    struct Scripted {
        queue: Mutex<VecDeque<Result<&'static str, ()>>>,
        last: Mutex<&'static str>,
    }

    impl Scripted {
        fn new(items: Vec<Result<&'static str, ()>>) -> Arc<Self> {
            Arc::new(Self {
                queue: Mutex::new(items.into()),
                last: Mutex::new(""),
            })
        }
    }

    impl TopologySource for Scripted {
        fn snapshot(&self) -> Result<TopologySnapshot, TopologyError> {
            match self.queue.lock().pop_front() {
                Some(Ok(text)) => {
                    *self.last.lock() = text;
                    Ok(TopologySnapshot::new(text))
                }
                Some(Err(())) => Err(TopologyError::EmptyCommand),
                None => Ok(TopologySnapshot::new(*self.last.lock())),
            }
        }
    }

    #[test]
    fn test_identical_snapshots_keep_monitoring() {
        let mut watchdog = TopologyWatchdog::new(Scripted::new(vec![Ok("a"), Ok("a"), Ok("a")]));
        assert_eq!(watchdog.check(), WatchdogState::Monitoring);
        assert_eq!(watchdog.check(), WatchdogState::Monitoring);
    }

    #[test]
    fn test_change_triggers_restart_once() {
        let mut watchdog = TopologyWatchdog::new(Scripted::new(vec![Ok("a"), Ok("b")]));
        assert_eq!(watchdog.check(), WatchdogState::Restarting);
        // Terminal
        assert_eq!(watchdog.observe(Ok(TopologySnapshot::new("a"))), WatchdogState::Restarting);
    }

    #[test]
    fn test_probe_failure_is_not_a_change() {
        let mut watchdog = TopologyWatchdog::new(Scripted::new(vec![Ok("a"), Err(()), Ok("a")]));
        assert_eq!(watchdog.check(), WatchdogState::Monitoring);
        assert_eq!(watchdog.check(), WatchdogState::Monitoring);
    }

    #[test]
    fn test_failed_initial_snapshot_defers_baseline() {
        let mut watchdog = TopologyWatchdog::new(Scripted::new(vec![Err(()), Ok("a"), Ok("b")]));
        assert_eq!(watchdog.check(), WatchdogState::Monitoring);
        assert_eq!(watchdog.check(), WatchdogState::Restarting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sends_single_restart() {
        let source = Scripted::new(vec![Ok("a"), Ok("a"), Ok("b"), Ok("c")]);
        let watchdog = TopologyWatchdog::new(source);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        watchdog.run(Duration::from_secs(5), tx, shutdown_rx).await;

        assert_eq!(rx.recv().await, Some(RestartReason::TopologyChanged));
        // Sender dropped after the single request
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_on_shutdown() {
        let watchdog = TopologyWatchdog::new(Scripted::new(vec![Ok("a")]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(watchdog.run(Duration::from_secs(5), tx, shutdown_rx));
        time::sleep(Duration::from_secs(12)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(rx.recv().await, None);
    }
}
