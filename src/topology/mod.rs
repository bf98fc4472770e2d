//! Topology watchdog subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer
//!     → source.rs (external tool or backend enumeration)
//!     → TopologySnapshot (opaque bytes)
//!     → watchdog.rs (compare with baseline)
//!     → on change: RestartReason::TopologyChanged → lifecycle
//! ```
//!
//! # Design Decisions
//! - Snapshots are compared byte-for-byte and never parsed
//! - Any change restarts the whole process; there is no per-device rebinding
//! - Probes run on the blocking pool so a slow tool never stalls the runtime

pub mod source;
pub mod watchdog;

use std::sync::Arc;

use crate::config::WatchdogConfig;
use crate::midi::MidiBackend;

pub use source::{BackendSource, CommandSource, TopologyError, TopologySnapshot, TopologySource};
pub use watchdog::{TopologyWatchdog, WatchdogState};

/// Pick the snapshot source the settings ask for.
pub fn source_from_config(
    config: &WatchdogConfig,
    backend: Arc<dyn MidiBackend>,
) -> Arc<dyn TopologySource> {
    if config.command.is_empty() {
        return Arc::new(BackendSource::new(backend));
    }
    match CommandSource::new(&config.command) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::warn!(error = %e, "Falling back to backend enumeration for topology snapshots");
            Arc::new(BackendSource::new(backend))
        }
    }
}
