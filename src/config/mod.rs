//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! route file (line oriented)
//!     → loader.rs (parse, collect warnings)
//!     → RouteConfig (definitions + RouteTable, immutable)
//!     → shared via Arc with resolver and router
//!
//! settings file (TOML, optional)
//!     → loader.rs (deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterSettings
//!
//! On route file change (optional):
//!     watcher.rs detects change
//!     → restart request (routes are never swapped in place)
//! ```
//!
//! # Design Decisions
//! - Routes are immutable once loaded; changes require a full restart
//! - Route file problems are warnings, only a missing file is fatal
//! - All settings fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_routes, load_settings, parse_routes, ConfigError, ConfigWarning};
pub use schema::{
    Definition, LogFormat, ObservabilityConfig, RestartMode, RouteConfig, RouteTable,
    RouterSettings, StatsConfig, WatchdogConfig, DEFAULT_ROUTES_PATH,
};
