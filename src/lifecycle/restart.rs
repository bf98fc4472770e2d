//! Process self-replacement.
//!
//! # Design Decisions
//! - Ports are released by the caller before relaunching
//! - Unix replaces the process image in place (same pid, args, environment)
//! - Elsewhere a fresh child is spawned and this process exits

use std::ffi::OsString;
use std::fmt;
use std::process::Command;

/// Why the running instance asked to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    TopologyChanged,
    RoutesFileChanged,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartReason::TopologyChanged => write!(f, "MIDI topology changed"),
            RestartReason::RoutesFileChanged => write!(f, "route file changed"),
        }
    }
}

fn relaunch_command() -> std::io::Result<Command> {
    let exe = std::env::current_exe()?;
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();
    let mut command = Command::new(exe);
    command.args(args);
    Ok(command)
}

/// Re-launch the current executable with identical arguments and
/// environment. Only returns if that failed.
#[cfg(unix)]
pub fn relaunch() -> std::io::Error {
    use std::os::unix::process::CommandExt;

    match relaunch_command() {
        Ok(mut command) => {
            tracing::info!("Re-executing process image");
            command.exec()
        }
        Err(e) => e,
    }
}

/// Re-launch the current executable with identical arguments and
/// environment. Only returns if that failed.
#[cfg(not(unix))]
pub fn relaunch() -> std::io::Error {
    match relaunch_command().and_then(|mut command| command.spawn()) {
        Ok(child) => {
            tracing::info!(pid = child.id(), "Replacement process spawned, exiting");
            std::process::exit(0)
        }
        Err(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaunch_command_targets_current_exe() {
        let command = relaunch_command().unwrap();
        assert_eq!(command.get_program(), std::env::current_exe().unwrap().as_os_str());
        assert_eq!(command.get_args().count(), std::env::args_os().count() - 1);
    }
}
