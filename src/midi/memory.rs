//! In-process MIDI backend.
//!
//! Holds a fake device list, records everything sent, and lets callers
//! inject messages on inputs. Handlers run on the injecting thread, which
//! stands in for a driver's delivery thread.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::midi::{Error, InputPort, MessageHandler, MidiBackend, OutputPort, Result};

/// One message written to an output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub port: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct State {
    inputs: Vec<String>,
    outputs: Vec<String>,
    connections: Vec<(u64, String, Arc<dyn MessageHandler>)>,
    next_id: u64,
    open_outputs: usize,
    sent: Vec<SentMessage>,
    failing: HashSet<String>,
}

/// [`MidiBackend`] with no hardware behind it.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new(inputs: &[&str], outputs: &[&str]) -> Self {
        let backend = Self::default();
        backend.set_devices(inputs, outputs);
        backend
    }

    /// Replace the enumerated device lists. Open ports stay open.
    pub fn set_devices(&self, inputs: &[&str], outputs: &[&str]) {
        let mut state = self.state.lock();
        state.inputs = inputs.iter().map(|s| s.to_string()).collect();
        state.outputs = outputs.iter().map(|s| s.to_string()).collect();
    }

    /// Deliver a message on every open connection to the named input.
    /// Returns the number of handlers invoked.
    pub fn inject(&self, input: &str, bytes: &[u8]) -> usize {
        // Handlers may send on outputs, so they run without the lock held
        let handlers: Vec<Arc<dyn MessageHandler>> = self
            .state
            .lock()
            .connections
            .iter()
            .filter(|(_, name, _)| name == input)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        for handler in &handlers {
            handler.on_message(bytes);
        }
        handlers.len()
    }

    /// Make every send on the named output fail.
    pub fn fail_output(&self, output: &str) {
        self.state.lock().failing.insert(output.to_string());
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().sent.clone()
    }

    /// Messages sent to one output.
    pub fn sent_to(&self, output: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|m| m.port == output)
            .map(|m| m.bytes.clone())
            .collect()
    }

    /// Number of inputs and outputs currently open.
    pub fn open_ports(&self) -> usize {
        let state = self.state.lock();
        state.connections.len() + state.open_outputs
    }

    fn register_input(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Box<dyn InputPort> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.connections.push((id, name.to_string(), handler));
        Box::new(MemoryInput {
            id,
            name: name.to_string(),
            state: self.state.clone(),
        })
    }

    fn register_output(&self, name: &str) -> Box<dyn OutputPort> {
        self.state.lock().open_outputs += 1;
        Box::new(MemoryOutput {
            name: name.to_string(),
            state: self.state.clone(),
        })
    }
}

struct MemoryInput {
    id: u64,
    name: String,
    state: Arc<Mutex<State>>,
}

impl InputPort for MemoryInput {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        // The handler may own the last reference to an output, whose drop locks state
        let removed = {
            let mut state = self.state.lock();
            let position = state.connections.iter().position(|(id, _, _)| *id == self.id);
            position.map(|index| state.connections.remove(index))
        };
        drop(removed);
    }
}

struct MemoryOutput {
    name: String,
    state: Arc<Mutex<State>>,
}

impl OutputPort for MemoryOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing.contains(&self.name) {
            return Err(Error::Send(format!("{} is unavailable", self.name)));
        }
        state.sent.push(SentMessage {
            port: self.name.clone(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open_outputs = state.open_outputs.saturating_sub(1);
    }
}

impl MidiBackend for MemoryBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().inputs.clone())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().outputs.clone())
    }

    fn connect_input(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>> {
        if !self.state.lock().inputs.iter().any(|n| n == name) {
            return Err(Error::PortNotFound(name.to_string()));
        }
        Ok(self.register_input(name, handler))
    }

    fn connect_output(&self, name: &str) -> Result<Box<dyn OutputPort>> {
        if !self.state.lock().outputs.iter().any(|n| n == name) {
            return Err(Error::PortNotFound(name.to_string()));
        }
        Ok(self.register_output(name))
    }

    fn create_virtual_input(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>> {
        Ok(self.register_input(name, handler))
    }

    fn create_virtual_output(&self, name: &str) -> Result<Box<dyn OutputPort>> {
        Ok(self.register_output(name))
    }
}
