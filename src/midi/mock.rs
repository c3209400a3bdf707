//! In-memory host used by the session tests.

use crate::connection::DeviceId;
use crate::events::OpenTicket;
use crate::midi::device::{DeviceInfo, DeviceProperties, MidiDevice, MidiHost, OutputChannel, PortInfo};
use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Host-side calls in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RequestOpen(String, OpenTicket),
    OpenPort(String, u32),
    CloseChannel(String, u32),
    CloseDevice(String),
}

#[derive(Default)]
struct HostLogInner {
    calls: Vec<Call>,
    channels: Vec<ChannelLog>,
}

#[derive(Clone, Default)]
pub struct HostLog(Arc<Mutex<HostLogInner>>);

impl HostLog {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn open_requests(&self) -> Vec<(String, OpenTicket)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::RequestOpen(dev, ticket) => Some((dev, ticket)),
                _ => None,
            })
            .collect()
    }

    pub fn last_ticket(&self) -> OpenTicket {
        self.open_requests().last().unwrap().1
    }

    /// Log of the n-th channel opened through this host
    pub fn channel(&self, n: usize) -> ChannelLog {
        self.0.lock().unwrap().channels[n].clone()
    }

    pub fn channel_count(&self) -> usize {
        self.0.lock().unwrap().channels.len()
    }
}

#[derive(Default)]
struct ChannelLogInner {
    sent: Vec<Vec<u8>>,
    attempts: usize,
    fail_at: HashSet<usize>,
    fail_all: bool,
    closed: bool,
}

#[derive(Clone, Default)]
pub struct ChannelLog(Arc<Mutex<ChannelLogInner>>);

impl ChannelLog {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().sent.clone()
    }

    /// Make the send attempt with this zero-based index fail
    pub fn fail_send_at(&self, attempt: usize) {
        self.0.lock().unwrap().fail_at.insert(attempt);
    }

    pub fn fail_all_sends(&self) {
        self.0.lock().unwrap().fail_all = true;
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().unwrap().closed
    }
}

pub struct MockChannel {
    device: String,
    port: u32,
    log: ChannelLog,
    host: Option<HostLog>,
}

impl MockChannel {
    pub fn new() -> (Self, ChannelLog) {
        let log = ChannelLog::default();
        let channel = Self {
            device: String::new(),
            port: 0,
            log: log.clone(),
            host: None,
        };
        (channel, log)
    }
}

impl OutputChannel for MockChannel {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        let mut inner = self.log.0.lock().unwrap();
        let attempt = inner.attempts;
        inner.attempts += 1;
        if inner.closed {
            return Err(anyhow!("channel closed"));
        }
        if inner.fail_all || inner.fail_at.contains(&attempt) {
            return Err(anyhow!("mock send failure"));
        }
        inner.sent.push(message.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.log.0.lock().unwrap().closed = true;
        if let Some(host) = &self.host {
            host.record(Call::CloseChannel(self.device.clone(), self.port));
        }
        Ok(())
    }
}

pub struct MockDevice {
    id: String,
    log: HostLog,
    fail_port: bool,
    fail_send_at: Option<usize>,
}

impl MockDevice {
    pub fn new(id: &str, log: &HostLog) -> Self {
        Self {
            id: id.to_string(),
            log: log.clone(),
            fail_port: false,
            fail_send_at: None,
        }
    }

    pub fn failing_port(mut self) -> Self {
        self.fail_port = true;
        self
    }

    /// The channel opened from this device fails the given send attempt
    pub fn failing_send_at(mut self, attempt: usize) -> Self {
        self.fail_send_at = Some(attempt);
        self
    }
}

impl MidiDevice for MockDevice {
    fn open_input_port(&mut self, number: u32) -> Result<Box<dyn OutputChannel>> {
        if self.fail_port {
            return Err(anyhow!("port {} unavailable", number));
        }
        self.log.record(Call::OpenPort(self.id.clone(), number));
        let channel_log = ChannelLog::default();
        if let Some(attempt) = self.fail_send_at {
            channel_log.fail_send_at(attempt);
        }
        self.log.0.lock().unwrap().channels.push(channel_log.clone());
        Ok(Box::new(MockChannel {
            device: self.id.clone(),
            port: number,
            log: channel_log,
            host: Some(self.log.clone()),
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.log.record(Call::CloseDevice(self.id.clone()));
        Ok(())
    }
}

pub struct MockHost {
    devices: Vec<DeviceInfo>,
    refuse: HashSet<String>,
    log: HostLog,
}

impl MockHost {
    pub fn new() -> (Self, HostLog) {
        let log = HostLog::default();
        let host = Self {
            devices: Vec::new(),
            refuse: HashSet::new(),
            log: log.clone(),
        };
        (host, log)
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.devices.push(device);
        self
    }

    /// `request_open` for this device fails synchronously
    pub fn refusing(mut self, id: &str) -> Self {
        self.refuse.insert(id.to_string());
        self
    }
}

impl MidiHost for MockHost {
    fn devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self.devices.clone())
    }

    fn request_open(&mut self, device: &DeviceInfo, ticket: OpenTicket) -> Result<()> {
        if self.refuse.contains(device.id.as_str()) {
            return Err(anyhow!("invalid device {}", device.id));
        }
        self.log.record(Call::RequestOpen(device.id.to_string(), ticket));
        Ok(())
    }
}

/// A named device with `inputs` unnamed input ports
pub fn device(id: &str, name: &str, inputs: u32) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId::new(id),
        properties: DeviceProperties {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ports: (0..inputs).map(|n| PortInfo::input(n, None)).collect(),
    }
}
