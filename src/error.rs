//! Crate-level error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::topology::TopologyError;

#[derive(Debug, Error)]
pub enum Error {
    /// Route or settings file could not be loaded. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Midi(#[from] crate::midi::Error),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("restart failed: {0}")]
    Restart(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
