//! MIDI Router
//!
//! # Architecture Overview
//!
//! ```text
//!   midi_routes.txt ──▶ config ──▶ (Definitions, RouteTable)
//!                                        │
//!                                        ▼
//!   live devices ◀──── routing::resolver (open outputs, then inputs)
//!        │                               │
//!        │ delivery thread per input     ▼
//!        └──────────────▶ routing::router ──▶ destination outputs
//!                                │
//!                                ▼
//!                     observability::stats ──▶ periodic report
//!
//!   topology::watchdog (interval) ── change ──▶ lifecycle::restart
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use midi_router::config::{
    load_settings, validation::validate_settings, ConfigError, LogFormat, RestartMode,
    RouterSettings,
};
use midi_router::lifecycle::{relaunch, signals, start_session, SessionExit};
use midi_router::midi::MidiBackend;
use midi_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "midi-router")]
#[command(about = "Route MIDI between devices according to a route file", long_about = None)]
#[command(version)]
struct Cli {
    /// Route file
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Seconds between statistics reports
    #[arg(long)]
    stats_interval: Option<u64>,

    /// Seconds between topology snapshots
    #[arg(long)]
    watch_interval: Option<u64>,

    /// Disable the topology watchdog
    #[arg(long)]
    no_watchdog: bool,

    /// Open virtual ports for unmatched endpoints
    #[arg(long)]
    virtual_fallback: bool,

    /// How to restart after a topology change
    #[arg(long, value_enum)]
    restart_mode: Option<RestartMode>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn settings(&self) -> Result<RouterSettings, ConfigError> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => RouterSettings::default(),
        };

        if let Some(routes) = &self.routes {
            settings.routes_path = routes.clone();
        }
        if let Some(secs) = self.stats_interval {
            settings.stats.interval_secs = secs;
        }
        if let Some(secs) = self.watch_interval {
            settings.watchdog.interval_secs = secs;
        }
        if self.no_watchdog {
            settings.watchdog.enabled = false;
        }
        if self.virtual_fallback {
            settings.virtual_fallback = true;
        }
        if let Some(mode) = self.restart_mode {
            settings.watchdog.restart_mode = mode;
        }
        if let Some(format) = self.log_format {
            settings.observability.log_format = format;
        }

        validate_settings(&settings).map_err(ConfigError::Validation)?;
        Ok(settings)
    }
}

#[cfg(feature = "midi-io")]
fn midi_backend(settings: &RouterSettings) -> Arc<dyn MidiBackend> {
    Arc::new(midi_router::midi::MidirBackend::new(settings.client_name.clone()))
}

#[cfg(not(feature = "midi-io"))]
fn midi_backend(_settings: &RouterSettings) -> Arc<dyn MidiBackend> {
    tracing::warn!("Built without hardware MIDI support, no devices will be found");
    Arc::new(midi_router::midi::MemoryBackend::default())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    logging::init_logging(&settings.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        routes = %settings.routes_path.display(),
        stats_interval_secs = settings.stats.interval_secs,
        watchdog = settings.watchdog.enabled,
        watch_interval_secs = settings.watchdog.interval_secs,
        "midi-router starting"
    );

    if settings.observability.metrics_enabled {
        if let Ok(addr) = settings.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let backend = midi_backend(&settings);

    loop {
        let session = match start_session(&settings, backend.clone()).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Startup failed");
                return Err(e.into());
            }
        };

        match session.run_until(signals::wait_for_signal()).await {
            SessionExit::Shutdown => break,
            SessionExit::Restart(reason) => match settings.watchdog.restart_mode {
                RestartMode::InProcess => {
                    tracing::info!(%reason, "Restarting in process");
                }
                RestartMode::Exec => {
                    tracing::info!(%reason, "Relaunching process");
                    let err = relaunch();
                    tracing::error!(error = %err, "Relaunch failed");
                    return Err(midi_router::Error::Restart(err).into());
                }
            },
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
