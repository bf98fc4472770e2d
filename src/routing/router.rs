//! Message dispatch.
//!
//! # Responsibilities
//! - Hold the route table and the frozen output map
//! - Forward each delivered message, unchanged, to every resolved destination
//! - Keep per-endpoint counters current
//!
//! # Design Decisions
//! - Immutable after construction; only the per-output mutex is taken on the
//!   hot path, so sources never contend unless they share a destination
//! - Unresolved destinations are skipped silently
//! - Send failures are logged and dropped for that message only

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::RouteTable;
use crate::midi::MessageHandler;
use crate::observability::metrics;
use crate::observability::Stats;
use crate::routing::resolver::SharedOutput;

/// What happened to one delivered message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Forwards messages according to the route table.
pub struct Router {
    routes: RouteTable,
    outputs: HashMap<String, SharedOutput>,
    stats: Arc<Stats>,
}

impl Router {
    pub fn new(routes: RouteTable, outputs: HashMap<String, SharedOutput>, stats: Arc<Stats>) -> Self {
        Self {
            routes,
            outputs,
            stats,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Dispatch a message delivered on `source` using the route table.
    pub fn dispatch(&self, source: &str, bytes: &[u8]) -> DispatchOutcome {
        match self.routes.destinations(source) {
            Some(destinations) => self.forward(source, destinations.iter(), bytes),
            None => self.forward(source, std::iter::empty::<&String>(), bytes),
        }
    }

    /// Count the message on `source`, then send it to each destination in
    /// turn. Returns once every destination has been handled.
    pub fn forward<'d, I>(&self, source: &str, destinations: I, bytes: &[u8]) -> DispatchOutcome
    where
        I: IntoIterator<Item = &'d String>,
    {
        self.stats.record_received(source);
        tracing::trace!(source, message = ?bytes, "MIDI message received");

        let mut outcome = DispatchOutcome::default();
        for destination in destinations {
            let Some(output) = self.outputs.get(destination) else {
                outcome.skipped += 1;
                continue;
            };

            let mut slot = output.lock();
            // Empty once the registry has released the device
            let Some(port) = slot.as_mut() else {
                outcome.skipped += 1;
                continue;
            };
            let result = port.send(bytes);
            drop(slot);

            match result {
                Ok(()) => {
                    self.stats.record_sent(destination);
                    outcome.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(source, destination = %destination, error = %e, "Forward failed, message dropped");
                    metrics::record_send_failure(destination);
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }

    /// Build the delivery callback for one source.
    pub fn handler(self: &Arc<Self>, source: &str) -> Arc<dyn MessageHandler> {
        let destinations = self
            .routes
            .destinations(source)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();

        Arc::new(SourceHandler {
            source: source.to_string(),
            destinations,
            router: Arc::clone(self),
        })
    }
}

/// Delivery callback bound to one source and its destination set.
pub struct SourceHandler {
    source: String,
    destinations: Vec<String>,
    router: Arc<Router>,
}

impl MessageHandler for SourceHandler {
    fn on_message(&self, bytes: &[u8]) {
        // Unwinding into the driver's thread must never happen
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.router.forward(&self.source, &self.destinations, bytes)
        }));
        if result.is_err() {
            tracing::error!(source = %self.source, "Dispatch panicked, message dropped");
        }
    }
}
