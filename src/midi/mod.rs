//! MIDI subsystem boundary.
//!
//! # Data Flow
//! ```text
//! MidiBackend (device enumeration, open/close, virtual ports)
//!     → InputPort  ── delivers raw bytes ──▶ MessageHandler (backend thread)
//!     → OutputPort ◀── send(raw bytes) ──── Router
//! ```
//!
//! # Design Decisions
//! - The core never talks to a driver directly; everything goes through
//!   [`MidiBackend`] so routing can be exercised without hardware
//! - Ports are opened by exact name from a fresh enumeration; name matching
//!   policy lives in the resolver, not here
//! - Dropping a port handle closes it

use std::sync::Arc;

use thiserror::Error;

pub mod memory;
#[cfg(feature = "midi-io")]
pub mod midir_backend;

pub use memory::{MemoryBackend, SentMessage};
#[cfg(feature = "midi-io")]
pub use midir_backend::MidirBackend;

#[derive(Error, Debug)]
pub enum Error {
    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("no MIDI port named '{0}'")]
    PortNotFound(String),

    #[error("MIDI send error: {0}")]
    Send(String),

    #[error("virtual ports are not supported by this backend")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Receives every message delivered on one opened input.
///
/// Called on the backend's delivery thread, concurrently with other inputs.
/// Implementations must not block for long and must not panic.
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, bytes: &[u8]);
}

/// An opened input. Dropping it stops delivery and releases the device.
pub trait InputPort: Send {
    fn name(&self) -> &str;
}

/// An opened output. Dropping it releases the device.
pub trait OutputPort: Send {
    fn name(&self) -> &str;

    /// Send one raw message, unchanged.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// The set of MIDI capabilities the router consumes.
pub trait MidiBackend: Send + Sync {
    /// Live input names in enumeration order.
    fn input_names(&self) -> Result<Vec<String>>;

    /// Live output names in enumeration order.
    fn output_names(&self) -> Result<Vec<String>>;

    /// Open the first input whose name equals `name` and deliver its
    /// messages to `handler`.
    fn connect_input(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>>;

    /// Open the first output whose name equals `name`.
    fn connect_output(&self, name: &str) -> Result<Box<dyn OutputPort>>;

    /// Create a software-only input that other applications can write to.
    fn create_virtual_input(
        &self,
        _name: &str,
        _handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>> {
        Err(Error::Unsupported)
    }

    /// Create a software-only output that other applications can read from.
    fn create_virtual_output(&self, _name: &str) -> Result<Box<dyn OutputPort>> {
        Err(Error::Unsupported)
    }
}
