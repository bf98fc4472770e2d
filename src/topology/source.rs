//! Topology snapshot sources.

use std::fmt;
use std::process::Command;
use std::sync::Arc;

use thiserror::Error;

use crate::midi::{self, MidiBackend};

/// Opaque capture of the device/connection graph. Only ever compared.
#[derive(Clone, PartialEq, Eq)]
pub struct TopologySnapshot(Vec<u8>);

impl TopologySnapshot {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TopologySnapshot({} bytes)", self.0.len())
    }
}

impl fmt::Display for TopologySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("topology command is empty")]
    EmptyCommand,

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: String },

    #[error("device enumeration failed: {0}")]
    Enumeration(#[from] midi::Error),
}

/// Produces snapshots of the current topology.
pub trait TopologySource: Send + Sync {
    fn snapshot(&self) -> Result<TopologySnapshot, TopologyError>;
}

/// Runs an external enumeration tool and captures its stdout.
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    /// Build from `[program, args...]`.
    pub fn new(command: &[String]) -> Result<Self, TopologyError> {
        let (program, args) = command.split_first().ok_or(TopologyError::EmptyCommand)?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl TopologySource for CommandSource {
    fn snapshot(&self) -> Result<TopologySnapshot, TopologyError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|source| TopologyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TopologyError::ExitStatus {
                program: self.program.clone(),
                status: output.status.to_string(),
            });
        }
        Ok(TopologySnapshot::new(output.stdout))
    }
}

/// Builds a snapshot from the MIDI backend's own port lists.
pub struct BackendSource {
    backend: Arc<dyn MidiBackend>,
}

impl BackendSource {
    pub fn new(backend: Arc<dyn MidiBackend>) -> Self {
        Self { backend }
    }
}

impl TopologySource for BackendSource {
    fn snapshot(&self) -> Result<TopologySnapshot, TopologyError> {
        let mut text = String::new();
        for name in self.backend.input_names()? {
            text.push_str("in\t");
            text.push_str(&name);
            text.push('\n');
        }
        for name in self.backend.output_names()? {
            text.push_str("out\t");
            text.push_str(&name);
            text.push('\n');
        }
        Ok(TopologySnapshot::new(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MemoryBackend;

    #[test]
    fn test_backend_source_reflects_device_changes() {
        let backend = MemoryBackend::new(&["Keys"], &["Synth"]);
        let source = BackendSource::new(Arc::new(backend.clone()));

        let first = source.snapshot().unwrap();
        assert_eq!(first, source.snapshot().unwrap());
        assert_eq!(first.to_string(), "in\tKeys\nout\tSynth\n");

        backend.set_devices(&["Keys"], &["Synth", "Drums"]);
        assert_ne!(first, source.snapshot().unwrap());
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(CommandSource::new(&[]), Err(TopologyError::EmptyCommand)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_captures_stdout() {
        let source = CommandSource::new(&["echo".into(), "client 14".into()]).unwrap();
        assert_eq!(source.snapshot().unwrap().as_bytes(), b"client 14\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_source_failures() {
        let missing = CommandSource::new(&["definitely-not-a-real-tool-xyz".into()]).unwrap();
        assert!(matches!(missing.snapshot(), Err(TopologyError::Spawn { .. })));

        let failing = CommandSource::new(&["false".into()]).unwrap();
        assert!(matches!(failing.snapshot(), Err(TopologyError::ExitStatus { .. })));
    }
}
