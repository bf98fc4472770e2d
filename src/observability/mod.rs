//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router callbacks
//!     → stats.rs (atomic per-endpoint counters)
//!     → metrics.rs (Prometheus counters, optional)
//!
//! StatsCollector (interval)
//!     → read+reset counters
//!     → logging.rs (structured report lines)
//! ```
//!
//! # Design Decisions
//! - Structured logging, JSON optional for machine parsing
//! - Counters are cheap (atomic increments) on the delivery path

pub mod logging;
pub mod metrics;
pub mod stats;

pub use stats::{EndpointReport, Stats, StatsCollector};
