//! MIDI Router Library
//!
//! Routes MIDI messages between devices according to a line-oriented route
//! file, and restarts itself whenever the device topology changes.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod midi;
pub mod observability;
pub mod routing;
pub mod topology;

pub use config::{RouteConfig, RouterSettings};
pub use error::{Error, Result};
pub use lifecycle::{start_session, Session, SessionExit, Shutdown};
pub use routing::Router;
