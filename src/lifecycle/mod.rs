//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load routes → Open outputs → Freeze router → Connect inputs → Start tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal or restart request → Stop tasks → Release inputs → Release outputs
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → end session, exit
//!
//! Restart (restart.rs):
//!     Topology or route file change → end session → re-exec (or new session)
//! ```
//!
//! # Design Decisions
//! - Restart is the only way routes or ports change
//! - Every exit path releases ports before the process goes away

pub mod restart;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use restart::{relaunch, RestartReason};
pub use shutdown::Shutdown;
pub use startup::{start_session, Session, SessionExit};
