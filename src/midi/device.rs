//! Boundary to the host MIDI subsystem.
//!
//! The session talks to devices only through these traits. Errors coming back
//! are plain `anyhow` errors; the controller turns them into `SessionError`s.

use crate::connection::DeviceId;
use crate::events::OpenTicket;
use anyhow::Result;

/// Direction of a port as seen from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// The device receives on this port; we can write to it.
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub number: u32,
    pub name: Option<String>,
    pub kind: PortKind,
}

impl PortInfo {
    pub fn input(number: u32, name: Option<String>) -> Self {
        Self { number, name, kind: PortKind::Input }
    }

    pub fn output(number: u32, name: Option<String>) -> Self {
        Self { number, name, kind: PortKind::Output }
    }
}

/// Device metadata properties used for labels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub name: Option<String>,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub properties: DeviceProperties,
    pub ports: Vec<PortInfo>,
}

impl DeviceInfo {
    pub fn input_ports(&self) -> impl Iterator<Item = &PortInfo> {
        self.ports.iter().filter(|p| p.kind == PortKind::Input)
    }
}

/// Open channel to one input port of a device.
pub trait OutputChannel: Send {
    fn send(&mut self, message: &[u8]) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// A device handle obtained from a successful open request.
pub trait MidiDevice: Send {
    fn open_input_port(&mut self, number: u32) -> Result<Box<dyn OutputChannel>>;

    fn close(&mut self) -> Result<()>;
}

/// The host MIDI subsystem.
///
/// `request_open` must not block on the device. Its outcome is delivered
/// later as `HostEvent::DeviceOpened` or `HostEvent::DeviceOpenFailed`
/// carrying the same ticket. An `Err` return means the request was refused
/// outright.
pub trait MidiHost: Send {
    fn devices(&self) -> Result<Vec<DeviceInfo>>;

    fn request_open(&mut self, device: &DeviceInfo, ticket: OpenTicket) -> Result<()>;
}
