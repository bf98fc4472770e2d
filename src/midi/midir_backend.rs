//! Hardware MIDI via midir.
//!
//! Every open creates its own midir client, since midir consumes the client
//! when connecting.

use std::sync::Arc;

use midir::{
    ConnectError, Ignore, InitError, MidiInput, MidiInputConnection, MidiOutput,
    MidiOutputConnection, SendError,
};

use crate::midi::{Error, InputPort, MessageHandler, MidiBackend, OutputPort, Result};

impl From<InitError> for Error {
    fn from(e: InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

impl From<ConnectError<MidiInput>> for Error {
    fn from(e: ConnectError<MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

impl From<ConnectError<MidiOutput>> for Error {
    fn from(e: ConnectError<MidiOutput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

impl From<SendError> for Error {
    fn from(e: SendError) -> Self {
        Error::Send(e.to_string())
    }
}

/// [`MidiBackend`] backed by the platform MIDI system.
#[derive(Debug, Clone)]
pub struct MidirBackend {
    client_name: String,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }

    fn new_input(&self) -> Result<MidiInput> {
        let mut input = MidiInput::new(&self.client_name)?;
        // Forward everything, including SysEx and clock
        input.ignore(Ignore::None);
        Ok(input)
    }

    fn new_output(&self) -> Result<MidiOutput> {
        Ok(MidiOutput::new(&self.client_name)?)
    }
}

struct MidirInput {
    name: String,
    _connection: MidiInputConnection<()>,
}

impl InputPort for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }
}

struct MidirOutput {
    name: String,
    connection: MidiOutputConnection,
}

impl OutputPort for MidirOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.connection.send(bytes)?;
        Ok(())
    }
}

fn deliver(handler: Arc<dyn MessageHandler>) -> impl FnMut(u64, &[u8], &mut ()) + Send + 'static {
    move |_timestamp, message, _| handler.on_message(message)
}

impl MidiBackend for MidirBackend {
    fn input_names(&self) -> Result<Vec<String>> {
        let input = self.new_input()?;
        Ok(input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index))
            })
            .collect())
    }

    fn output_names(&self) -> Result<Vec<String>> {
        let output = self.new_output()?;
        Ok(output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index))
            })
            .collect())
    }

    fn connect_input(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>> {
        let input = self.new_input()?;
        let port = input
            .ports()
            .into_iter()
            .find(|p| input.port_name(p).map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::PortNotFound(name.to_string()))?;

        let connection = input.connect(&port, &self.client_name, deliver(handler), ())?;

        Ok(Box::new(MidirInput {
            name: name.to_string(),
            _connection: connection,
        }))
    }

    fn connect_output(&self, name: &str) -> Result<Box<dyn OutputPort>> {
        let output = self.new_output()?;
        let port = output
            .ports()
            .into_iter()
            .find(|p| output.port_name(p).map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| Error::PortNotFound(name.to_string()))?;

        let connection = output.connect(&port, &self.client_name)?;

        Ok(Box::new(MidirOutput {
            name: name.to_string(),
            connection,
        }))
    }

    #[cfg(unix)]
    fn create_virtual_input(
        &self,
        name: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Box<dyn InputPort>> {
        use midir::os::unix::VirtualInput;

        let input = self.new_input()?;
        let connection = input.create_virtual(name, deliver(handler), ())?;

        Ok(Box::new(MidirInput {
            name: name.to_string(),
            _connection: connection,
        }))
    }

    #[cfg(unix)]
    fn create_virtual_output(&self, name: &str) -> Result<Box<dyn OutputPort>> {
        use midir::os::unix::VirtualOutput;

        let output = self.new_output()?;
        let connection = output.create_virtual(name)?;

        Ok(Box::new(MidirOutput {
            name: name.to_string(),
            connection,
        }))
    }
}
