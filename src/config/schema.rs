//! Configuration schema definitions.
//!
//! Two kinds of configuration live here:
//! - The route file model ([`Definition`], [`RouteTable`], [`RouteConfig`]),
//!   produced by the line parser in `loader.rs`.
//! - Operational settings ([`RouterSettings`]), deserialized from an optional
//!   TOML file. Every field has a default so a missing file is fine.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigWarning;

/// Default route file, relative to the working directory.
pub const DEFAULT_ROUTES_PATH: &str = "midi_routes.txt";

/// A named endpoint bound to a device-matching key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    /// Symbolic endpoint id (`[A-Za-z0-9_]+`).
    pub id: String,

    /// Substring used to locate live devices.
    pub match_key: String,
}

/// Source id -> destination ids.
///
/// Destinations are a set: listing the same destination twice for one source
/// forwards each message to it once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteTable {
    routes: BTreeMap<String, BTreeSet<String>>,
}

impl RouteTable {
    pub(crate) fn insert(&mut self, source: &str, destinations: impl IntoIterator<Item = String>) {
        self.routes
            .entry(source.to_string())
            .or_default()
            .extend(destinations);
    }

    /// Destinations for a source, if it has any routes.
    pub fn destinations(&self, source: &str) -> Option<&BTreeSet<String>> {
        self.routes.get(source)
    }

    /// Iterate over `(source, destinations)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Parsed route file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
    /// Definitions in file order, ids unique.
    pub definitions: Vec<Definition>,

    /// Routes whose source is a known definition.
    pub routes: RouteTable,

    /// Recovered problems found while parsing.
    pub warnings: Vec<ConfigWarning>,
}

impl RouteConfig {
    /// Look up a definition by id.
    pub fn definition(&self, id: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// All endpoint ids that may appear in stats: every definition plus any
    /// destination id named by a route.
    pub fn endpoint_ids(&self) -> BTreeSet<String> {
        let mut ids: BTreeSet<String> = self.definitions.iter().map(|d| d.id.clone()).collect();
        for (_, destinations) in self.routes.iter() {
            ids.extend(destinations.iter().cloned());
        }
        ids
    }
}

/// Root operational settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Route file location.
    pub routes_path: PathBuf,

    /// Client name announced to the MIDI subsystem.
    pub client_name: String,

    /// Open a virtual port named after the match key when no device matches.
    pub virtual_fallback: bool,

    /// Statistics reporting.
    pub stats: StatsConfig,

    /// Topology watchdog.
    pub watchdog: WatchdogConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            routes_path: PathBuf::from(DEFAULT_ROUTES_PATH),
            client_name: "midi-router".to_string(),
            virtual_fallback: false,
            stats: StatsConfig::default(),
            watchdog: WatchdogConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Statistics reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Run the periodic reporter.
    pub enabled: bool,

    /// Report interval in seconds.
    pub interval_secs: u64,

    /// Report endpoints with no traffic since the last tick. Turning this
    /// off keeps quiet endpoints out of the log.
    pub report_idle: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            report_idle: true,
        }
    }
}

/// How the process replaces itself after a topology change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RestartMode {
    /// Re-exec the current process image with the same arguments.
    #[default]
    Exec,
    /// Tear everything down and run startup again inside this process.
    InProcess,
}

/// Topology watchdog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Run the watchdog.
    pub enabled: bool,

    /// Snapshot interval in seconds.
    pub interval_secs: u64,

    /// External enumeration tool and its arguments. Empty means the snapshot
    /// is built from the MIDI backend's own port lists.
    pub command: Vec<String>,

    /// Restart strategy.
    pub restart_mode: RestartMode,

    /// Also restart when the route file changes on disk.
    pub watch_routes_file: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            command: vec!["aconnect".to_string(), "-l".to_string()],
            restart_mode: RestartMode::Exec,
            watch_routes_file: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
