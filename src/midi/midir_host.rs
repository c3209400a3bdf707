//! `MidiHost` on top of midir.
//!
//! midir exposes flat output ports, so every port becomes one device with a
//! single input port (#0), keyed by its port name. Connecting happens on a
//! short-lived thread and the result comes back as a host event.

use crate::connection::DeviceId;
use crate::events::{HostEvent, HostEventSender, OpenTicket};
use crate::midi::device::{DeviceInfo, DeviceProperties, MidiDevice, MidiHost, OutputChannel, PortInfo};
use anyhow::{anyhow, bail, Result};
use midir::{MidiOutput, MidiOutputConnection};
use std::collections::BTreeSet;
use std::thread;
use tracing::debug;

pub const CLIENT_NAME: &str = "vkeys";
const OUTPUT_PORT_NAME: &str = "vkeys-out";

/// Lists output ports with a fresh midir client. Duplicate names collapse
/// into one device.
pub fn enumerate_devices() -> Result<Vec<DeviceInfo>> {
    let midi_out = MidiOutput::new(&format!("{}-list", CLIENT_NAME))?;

    let names: BTreeSet<String> = midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect();

    Ok(names.into_iter().map(device_info).collect())
}

fn device_info(name: String) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId::new(name.clone()),
        properties: DeviceProperties {
            name: Some(name),
            ..Default::default()
        },
        ports: vec![PortInfo::input(0, None)],
    }
}

pub struct MidirHost {
    events: HostEventSender,
}

impl MidirHost {
    pub fn new(events: HostEventSender) -> Self {
        Self { events }
    }
}

impl MidiHost for MidirHost {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        enumerate_devices()
    }

    fn request_open(&mut self, device: &DeviceInfo, ticket: OpenTicket) -> Result<()> {
        let name = device.id.as_str().to_string();
        let events = self.events.clone();

        thread::Builder::new()
            .name("midi-open".to_string())
            .spawn(move || {
                let event = match connect(&name) {
                    Ok(connection) => HostEvent::DeviceOpened {
                        ticket,
                        device: Box::new(MidirDevice {
                            name,
                            connection: Some(connection),
                        }),
                    },
                    Err(e) => HostEvent::DeviceOpenFailed {
                        ticket,
                        reason: e.to_string(),
                    },
                };
                // Receiver gone means the session was dropped; the device
                // handle in the event is dropped with it.
                let _ = events.send(event);
            })?;

        Ok(())
    }
}

fn connect(name: &str) -> Result<MidiOutputConnection> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let port = midi_out
        .ports()
        .into_iter()
        .find(|p| midi_out.port_name(p).map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| anyhow!("MIDI device '{}' not found", name))?;

    midi_out
        .connect(&port, OUTPUT_PORT_NAME)
        .map_err(|e| anyhow!("Failed to connect to '{}': {}", name, e))
}

/// Opened midir port waiting for its input port to be claimed
struct MidirDevice {
    name: String,
    connection: Option<MidiOutputConnection>,
}

impl MidiDevice for MidirDevice {
    fn open_input_port(&mut self, number: u32) -> Result<Box<dyn OutputChannel>> {
        if number != 0 {
            bail!("'{}' has no input port {}", self.name, number);
        }
        let connection = self
            .connection
            .take()
            .ok_or_else(|| anyhow!("input port of '{}' already open", self.name))?;
        Ok(Box::new(MidirChannel {
            connection: Some(connection),
        }))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        debug!(device = %self.name, "device closed");
        Ok(())
    }
}

struct MidirChannel {
    connection: Option<MidiOutputConnection>,
}

impl OutputChannel for MidirChannel {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| anyhow!("output channel is closed"))?;
        connection
            .send(message)
            .map_err(|e| anyhow!("Failed to send MIDI message: {}", e))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::catalog::port_label;

    #[test]
    fn test_device_info_has_single_input_port() {
        let info = device_info("IAC Driver Bus 1".to_string());
        assert_eq!(info.id.as_str(), "IAC Driver Bus 1");
        assert_eq!(info.input_ports().count(), 1);

        let port = info.input_ports().next().unwrap();
        assert_eq!(port_label(&info.properties, port), "IAC Driver Bus 1 [0]");
    }

    #[test]
    fn test_enumerate_devices() {
        // Only verifies that enumeration doesn't panic; available devices
        // vary by system and may not exist at all in CI.
        if let Ok(devices) = enumerate_devices() {
            println!("Found {} devices", devices.len());
        }
    }
}
