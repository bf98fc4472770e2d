//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Definitions
//!     → resolver.rs (match + open outputs)   → PortRegistry
//!     → router.rs   (route table + outputs)  → Router (frozen)
//!     → resolver.rs (match + connect inputs, one SourceHandler each)
//!
//! Steady state (backend delivery thread, one per input):
//!     raw bytes → SourceHandler → Router::forward
//!     → Stats (received) → each destination output → Stats (sent)
//! ```
//!
//! # Design Decisions
//! - Routes and outputs fixed at startup, immutable at runtime
//! - Deterministic matching: first case-sensitive substring match
//! - Unresolved endpoints are a normal outcome, never an error

pub mod matcher;
pub mod resolver;
pub mod router;

use std::sync::Arc;

use crate::config::RouteConfig;
use crate::midi::MidiBackend;
use crate::observability::Stats;

pub use matcher::{Matcher, SubstringMatcher};
pub use resolver::{Direction, OpenPort, PortRegistry, PortResolutionError, PortResolver, Resolution};
pub use router::{DispatchOutcome, Router};

/// Resolve every definition and wire inputs to the router.
///
/// Outputs are opened and frozen into the router before any input is
/// connected.
pub fn bind(
    backend: &dyn MidiBackend,
    config: &RouteConfig,
    stats: Arc<Stats>,
    virtual_fallback: bool,
) -> (Arc<Router>, PortRegistry) {
    let resolver = PortResolver::new(backend, virtual_fallback);

    let mut registry = resolver.resolve_outputs(&config.definitions);
    let router = Arc::new(Router::new(config.routes.clone(), registry.outputs(), stats));

    resolver.resolve_inputs(&mut registry, |id| router.handler(id));
    registry.log_summary();

    (router, registry)
}
