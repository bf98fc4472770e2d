//! Per-endpoint message counters and the periodic reporter.
//!
//! # Responsibilities
//! - Count messages received on each source and sent to each destination
//! - Read and reset every counter once per interval, then log a report
//!
//! # Design Decisions
//! - Counter map is built once from the route file and never grows, so the
//!   delivery path does no allocation and takes no lock
//! - Metric handles are registered alongside the counters for the same reason
//! - Read+reset is a single `swap(0)`, so increments racing with a tick land
//!   in exactly one report

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::StatsConfig;
use crate::observability::metrics;

struct EndpointCounters {
    received: AtomicU64,
    sent: AtomicU64,
    received_total: ::metrics::Counter,
    sent_total: ::metrics::Counter,
}

impl EndpointCounters {
    fn new(id: &str) -> Self {
        Self {
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            received_total: metrics::received_counter(id),
            sent_total: metrics::sent_counter(id),
        }
    }
}

impl fmt::Debug for EndpointCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCounters")
            .field("received", &self.received)
            .field("sent", &self.sent)
            .finish()
    }
}

/// Counts for one endpoint since the previous report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointReport {
    pub id: String,
    pub received: u64,
    pub sent: u64,
}

impl EndpointReport {
    pub fn is_idle(&self) -> bool {
        self.received == 0 && self.sent == 0
    }
}

/// Shared counters, one pair per endpoint id.
#[derive(Debug, Default)]
pub struct Stats {
    endpoints: BTreeMap<String, EndpointCounters>,
}

impl Stats {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: ids
                .into_iter()
                .map(|id| {
                    let id: String = id.into();
                    let counters = EndpointCounters::new(&id);
                    (id, counters)
                })
                .collect(),
        }
    }

    /// Count one message delivered on `id`. Unknown ids are ignored.
    pub fn record_received(&self, id: &str) {
        if let Some(counters) = self.endpoints.get(id) {
            counters.received.fetch_add(1, Ordering::Relaxed);
            counters.received_total.increment(1);
        }
    }

    /// Count one message forwarded to `id`. Unknown ids are ignored.
    pub fn record_sent(&self, id: &str) {
        if let Some(counters) = self.endpoints.get(id) {
            counters.sent.fetch_add(1, Ordering::Relaxed);
            counters.sent_total.increment(1);
        }
    }

    /// Current values without resetting.
    pub fn peek(&self, id: &str) -> Option<EndpointReport> {
        self.endpoints.get(id).map(|c| EndpointReport {
            id: id.to_string(),
            received: c.received.load(Ordering::Relaxed),
            sent: c.sent.load(Ordering::Relaxed),
        })
    }

    /// Read and zero every counter, ordered by id.
    pub fn take_snapshot(&self) -> Vec<EndpointReport> {
        self.endpoints
            .iter()
            .map(|(id, c)| EndpointReport {
                id: id.clone(),
                received: c.received.swap(0, Ordering::AcqRel),
                sent: c.sent.swap(0, Ordering::AcqRel),
            })
            .collect()
    }
}

/// Periodic stats reporter.
pub struct StatsCollector {
    stats: Arc<Stats>,
    config: StatsConfig,
}

impl StatsCollector {
    pub fn new(stats: Arc<Stats>, config: StatsConfig) -> Self {
        Self { stats, config }
    }

    /// Take one snapshot and log it. Every counter is reset; the returned
    /// entries are the ones that were reported.
    pub fn tick(&self) -> Vec<EndpointReport> {
        let reports: Vec<EndpointReport> = self
            .stats
            .take_snapshot()
            .into_iter()
            .filter(|r| self.config.report_idle || !r.is_idle())
            .collect();

        if !reports.is_empty() {
            let active = reports.iter().filter(|r| !r.is_idle()).count();
            tracing::info!(endpoints = reports.len(), active_endpoints = active, "MIDI statistics");
        }
        for report in &reports {
            tracing::info!(
                endpoint = %report.id,
                received = report.received,
                sent = report.sent,
                "Endpoint traffic"
            );
        }
        reports
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Stats reporting disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Stats collector starting");

        let interval = Duration::from_secs(self.config.interval_secs);
        // First tick of `interval` fires immediately; start one period out
        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Stats collector received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
