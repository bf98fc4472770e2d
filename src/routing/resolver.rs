//! Endpoint resolution against live devices.
//!
//! # Responsibilities
//! - Match each definition to at most one input and one output device
//! - Open matched devices (or virtual ports, when enabled)
//! - Own every opened handle until release
//!
//! # Design Decisions
//! - Resolution failures are never fatal; that side stays unresolved
//! - Outputs are resolved before any input is connected, so the output map
//!   the router reads is complete before the first message can arrive
//! - Inputs are released before outputs
//! - Release closes devices directly rather than waiting for the last
//!   `Arc` holder to go away

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::config::Definition;
use crate::midi::{self, InputPort, MessageHandler, MidiBackend, OutputPort};
use crate::observability::metrics;
use crate::routing::matcher::{Matcher, SubstringMatcher};

/// An output shared between the registry and the router.
///
/// The registry empties the slot on release, which closes the device even
/// while the router still holds the `Arc`.
pub type SharedOutput = Arc<Mutex<Option<Box<dyn OutputPort>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// How one side of a definition ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Resolution {
    Device(String),
    Virtual(String),
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Device(name) => write!(f, "{}", name),
            Resolution::Virtual(name) => write!(f, "{} (virtual)", name),
            Resolution::Unresolved => write!(f, "-"),
        }
    }
}

/// Why one side of a definition could not be opened.
#[derive(Debug, Error)]
pub enum PortResolutionError {
    #[error("no {direction} device matches '{key}'")]
    NoMatch { direction: Direction, key: String },

    #[error("failed to open {direction} '{device}': {source}")]
    Open {
        direction: Direction,
        device: String,
        #[source]
        source: midi::Error,
    },
}

/// Live handles for one definition.
pub struct OpenPort {
    pub definition: Definition,
    pub input: Resolution,
    pub output: Resolution,
    input_port: Option<Box<dyn InputPort>>,
    output_port: Option<SharedOutput>,
}

impl OpenPort {
    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn has_input(&self) -> bool {
        self.input_port.is_some()
    }

    pub fn has_output(&self) -> bool {
        self.output_port.is_some()
    }
}

impl fmt::Debug for OpenPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenPort")
            .field("id", &self.definition.id)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// Every opened port, in definition order. Dropping it closes them all.
#[derive(Debug, Default)]
pub struct PortRegistry {
    ports: Vec<OpenPort>,
}

impl PortRegistry {
    pub fn get(&self, id: &str) -> Option<&OpenPort> {
        self.ports.iter().find(|p| p.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenPort> {
        self.ports.iter()
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Resolved outputs by endpoint id.
    pub fn outputs(&self) -> HashMap<String, SharedOutput> {
        self.ports
            .iter()
            .filter_map(|p| p.output_port.clone().map(|o| (p.id().to_string(), o)))
            .collect()
    }

    /// Number of open handles.
    pub fn open_handles(&self) -> usize {
        self.ports
            .iter()
            .map(|p| p.has_input() as usize + p.has_output() as usize)
            .sum()
    }

    /// Close every handle, inputs first. Returns how many devices were
    /// actually closed.
    pub fn release(&mut self) -> usize {
        let mut released = 0;
        for port in &mut self.ports {
            if port.input_port.take().is_some() {
                released += 1;
            }
        }
        for port in &mut self.ports {
            let Some(output) = port.output_port.take() else {
                continue;
            };
            if output.lock().take().is_some() {
                released += 1;
            }
        }
        if released > 0 {
            tracing::info!(released, "MIDI ports released");
        }
        released
    }

    /// Log one line per definition with its resolution outcome.
    pub fn log_summary(&self) {
        for port in &self.ports {
            tracing::info!(
                endpoint = %port.id(),
                match_key = %port.definition.match_key,
                input = %port.input,
                output = %port.output,
                "Endpoint resolved"
            );
        }
        let inputs = self.ports.iter().filter(|p| p.has_input()).count();
        let outputs = self.ports.iter().filter(|p| p.has_output()).count();
        metrics::record_ports_resolved("input", inputs);
        metrics::record_ports_resolved("output", outputs);
        tracing::info!(
            definitions = self.ports.len(),
            inputs,
            outputs,
            "Port resolution complete"
        );
    }
}

impl Drop for PortRegistry {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens live ports for definitions.
pub struct PortResolver<'a> {
    backend: &'a dyn MidiBackend,
    virtual_fallback: bool,
}

impl<'a> PortResolver<'a> {
    pub fn new(backend: &'a dyn MidiBackend, virtual_fallback: bool) -> Self {
        Self {
            backend,
            virtual_fallback,
        }
    }

    fn enumerate(&self, direction: Direction) -> Vec<String> {
        let names = match direction {
            Direction::Input => self.backend.input_names(),
            Direction::Output => self.backend.output_names(),
        };
        names.unwrap_or_else(|e| {
            tracing::warn!(%direction, error = %e, "Device enumeration failed, treating as empty");
            Vec::new()
        })
    }

    /// Create the registry and open an output for every definition that
    /// matches one.
    pub fn resolve_outputs(&self, definitions: &[Definition]) -> PortRegistry {
        let names = self.enumerate(Direction::Output);
        let mut registry = PortRegistry::default();

        for definition in definitions {
            let (output, output_port) = match self.open_output(definition, &names) {
                Ok((resolution, port)) => (resolution, Some(Arc::new(Mutex::new(Some(port))))),
                Err(e) => {
                    log_unresolved(definition, &e);
                    (Resolution::Unresolved, None)
                }
            };

            registry.ports.push(OpenPort {
                definition: definition.clone(),
                input: Resolution::Unresolved,
                output,
                input_port: None,
                output_port,
            });
        }

        registry
    }

    /// Connect an input for every definition in the registry that matches
    /// one. `handler_for` is called with the endpoint id.
    pub fn resolve_inputs<F>(&self, registry: &mut PortRegistry, mut handler_for: F)
    where
        F: FnMut(&str) -> Arc<dyn MessageHandler>,
    {
        let names = self.enumerate(Direction::Input);

        for port in &mut registry.ports {
            let handler = handler_for(&port.definition.id);
            match self.open_input(&port.definition, &names, handler) {
                Ok((resolution, input)) => {
                    port.input = resolution;
                    port.input_port = Some(input);
                }
                Err(e) => log_unresolved(&port.definition, &e),
            }
        }
    }

    fn open_output(
        &self,
        definition: &Definition,
        names: &[String],
    ) -> Result<(Resolution, Box<dyn OutputPort>), PortResolutionError> {
        let key = &definition.match_key;
        match SubstringMatcher::new(key.as_str()).first_match(names) {
            Some(index) => {
                let device = &names[index];
                self.backend
                    .connect_output(device)
                    .map(|port| (Resolution::Device(device.clone()), port))
                    .map_err(|source| PortResolutionError::Open {
                        direction: Direction::Output,
                        device: device.clone(),
                        source,
                    })
            }
            None if self.virtual_fallback => self
                .backend
                .create_virtual_output(key)
                .map(|port| (Resolution::Virtual(key.clone()), port))
                .map_err(|source| PortResolutionError::Open {
                    direction: Direction::Output,
                    device: key.clone(),
                    source,
                }),
            None => Err(PortResolutionError::NoMatch {
                direction: Direction::Output,
                key: key.clone(),
            }),
        }
    }

    fn open_input(
        &self,
        definition: &Definition,
        names: &[String],
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(Resolution, Box<dyn InputPort>), PortResolutionError> {
        let key = &definition.match_key;
        match SubstringMatcher::new(key.as_str()).first_match(names) {
            Some(index) => {
                let device = &names[index];
                self.backend
                    .connect_input(device, handler)
                    .map(|port| (Resolution::Device(device.clone()), port))
                    .map_err(|source| PortResolutionError::Open {
                        direction: Direction::Input,
                        device: device.clone(),
                        source,
                    })
            }
            None if self.virtual_fallback => self
                .backend
                .create_virtual_input(key, handler)
                .map(|port| (Resolution::Virtual(key.clone()), port))
                .map_err(|source| PortResolutionError::Open {
                    direction: Direction::Input,
                    device: key.clone(),
                    source,
                }),
            None => Err(PortResolutionError::NoMatch {
                direction: Direction::Input,
                key: key.clone(),
            }),
        }
    }
}

fn log_unresolved(definition: &Definition, error: &PortResolutionError) {
    match error {
        PortResolutionError::NoMatch { .. } => {
            tracing::debug!(endpoint = %definition.id, "{}", error)
        }
        PortResolutionError::Open { .. } => {
            tracing::warn!(endpoint = %definition.id, "{}", error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MemoryBackend;

    struct Noop;
    impl MessageHandler for Noop {
        fn on_message(&self, _bytes: &[u8]) {}
    }

    fn def(id: &str, key: &str) -> Definition {
        Definition {
            id: id.into(),
            match_key: key.into(),
        }
    }

    fn resolve(backend: &MemoryBackend, defs: &[Definition], virtual_fallback: bool) -> PortRegistry {
        let resolver = PortResolver::new(backend, virtual_fallback);
        let mut registry = resolver.resolve_outputs(defs);
        resolver.resolve_inputs(&mut registry, |_| Arc::new(Noop));
        registry
    }

    #[test]
    fn test_input_only_output_only_and_unresolved() {
        let backend = MemoryBackend::new(&["Keys MIDI 1"], &["Synth MIDI 1"]);
        let registry = resolve(
            &backend,
            &[def("keys", "Keys"), def("synth", "Synth"), def("ghost", "Nope")],
            false,
        );

        let keys = registry.get("keys").unwrap();
        assert!(keys.has_input() && !keys.has_output());
        assert_eq!(keys.input, Resolution::Device("Keys MIDI 1".into()));

        let synth = registry.get("synth").unwrap();
        assert!(!synth.has_input() && synth.has_output());

        let ghost = registry.get("ghost").unwrap();
        assert!(!ghost.has_input() && !ghost.has_output());
        assert_eq!(ghost.output, Resolution::Unresolved);

        assert_eq!(registry.open_handles(), 2);
        assert_eq!(registry.outputs().len(), 1);
    }

    #[test]
    fn test_first_match_wins() {
        let backend = MemoryBackend::new(&[], &["Port A 2", "Port A 1"]);
        let registry = resolve(&backend, &[def("a", "Port A")], false);
        assert_eq!(
            registry.get("a").unwrap().output,
            Resolution::Device("Port A 2".into())
        );
    }

    #[test]
    fn test_virtual_fallback() {
        let backend = MemoryBackend::new(&[], &[]);
        let registry = resolve(&backend, &[def("v", "Router Out")], true);

        let port = registry.get("v").unwrap();
        assert_eq!(port.input, Resolution::Virtual("Router Out".into()));
        assert_eq!(port.output, Resolution::Virtual("Router Out".into()));
        assert_eq!(backend.open_ports(), 2);
    }

    #[test]
    fn test_release_closes_everything() {
        let backend = MemoryBackend::new(&["Keys"], &["Keys"]);
        let mut registry = resolve(&backend, &[def("k", "Keys")], false);
        assert_eq!(backend.open_ports(), 2);

        assert_eq!(registry.release(), 2);
        assert_eq!(backend.open_ports(), 0);
        // Idempotent
        assert_eq!(registry.release(), 0);
    }

    #[test]
    fn test_release_closes_outputs_still_shared() {
        let backend = MemoryBackend::new(&["Keys"], &["Synth"]);
        let mut registry = resolve(&backend, &[def("k", "Keys"), def("s", "Synth")], false);
        let shared = registry.outputs();
        assert_eq!(backend.open_ports(), 2);

        assert_eq!(registry.release(), 2);
        assert_eq!(backend.open_ports(), 0);
        assert!(shared["s"].lock().is_none());
    }

    #[test]
    fn test_drop_releases() {
        let backend = MemoryBackend::new(&["Keys"], &["Keys"]);
        let registry = resolve(&backend, &[def("k", "Keys")], false);
        drop(registry);
        assert_eq!(backend.open_ports(), 0);
    }
}
