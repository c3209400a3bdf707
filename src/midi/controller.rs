//! Lifecycle of the single output connection.
//!
//! All state changes go through `&mut self`; the session wraps the controller
//! in one mutex so host notifications and application sends are processed
//! one at a time, in arrival order.

use crate::connection::{ConnectionStatus, PortDescriptor, PortId};
use crate::error::SessionError;
use crate::events::{HostEvent, OpenTicket, SessionNotification, Subscribers};
use crate::midi::catalog::{PortCatalog, PortListing};
use crate::midi::device::{DeviceInfo, MidiDevice, MidiHost, OutputChannel};
use crate::midi::encoder::MidiEvent;
use crate::midi::queue::OutboundQueue;
use crossbeam::channel::Receiver;
use std::mem;
use tracing::{debug, info, warn};

/// Device and channel handles of an open connection
pub struct Link {
    device: Box<dyn MidiDevice>,
    channel: Box<dyn OutputChannel>,
}

impl Link {
    /// Closes the channel, then the device. Failures are logged only.
    fn close(mut self, port: &PortDescriptor) {
        if let Err(e) = self.channel.close() {
            warn!(port = %port, error = %e, "error when closing output channel");
        }
        close_device(self.device.as_mut(), port);
    }
}

fn close_device(device: &mut dyn MidiDevice, port: &PortDescriptor) {
    if let Err(e) = device.close() {
        warn!(port = %port, error = %e, "error when closing MIDI device");
    }
}

pub enum ConnectionState {
    Disconnected,
    Pending {
        port: PortDescriptor,
        ticket: OpenTicket,
    },
    Open {
        port: PortDescriptor,
        link: Link,
    },
    /// Only observable between a failure and the automatic return to
    /// `Disconnected`
    Failed {
        port: PortDescriptor,
        error: SessionError,
    },
}

impl ConnectionState {
    fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Pending { port, .. } => ConnectionStatus::Pending(port.clone()),
            ConnectionState::Open { port, .. } => ConnectionStatus::Open(port.clone()),
            ConnectionState::Failed { port, error } => {
                ConnectionStatus::Failed(port.clone(), error.to_string())
            }
        }
    }

    fn port(&self) -> Option<&PortDescriptor> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Pending { port, .. }
            | ConnectionState::Open { port, .. }
            | ConnectionState::Failed { port, .. } => Some(port),
        }
    }
}

pub struct ConnectionController {
    host: Box<dyn MidiHost>,
    catalog: PortCatalog,
    queue: OutboundQueue,
    state: ConnectionState,
    last_ticket: u64,
    subscribers: Subscribers,
}

impl ConnectionController {
    pub fn new(host: Box<dyn MidiHost>) -> Self {
        Self {
            host,
            catalog: PortCatalog::new(),
            queue: OutboundQueue::new(),
            state: ConnectionState::Disconnected,
            last_ticket: 0,
            subscribers: Subscribers::default(),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<SessionNotification> {
        self.subscribers.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.status()
    }

    pub fn list_ports(&self) -> PortListing {
        self.catalog.list()
    }

    pub fn lookup(&self, id: PortId) -> Option<PortDescriptor> {
        self.catalog.lookup(id).cloned()
    }

    pub fn find_port(&self, device: &str, port: u32) -> Option<PortDescriptor> {
        self.catalog.find(device, port).cloned()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Adds every device the host currently knows about
    pub fn enumerate(&mut self) {
        match self.host.devices() {
            Ok(devices) => {
                for device in devices {
                    self.on_device_attached(device);
                }
            }
            Err(e) => warn!(error = %e, "could not enumerate MIDI devices"),
        }
    }

    /// Single entry point for host notifications
    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::DeviceAttached(info) => self.on_device_attached(info),
            HostEvent::DeviceDetached(info) => self.on_device_detached(&info),
            HostEvent::DeviceOpened { ticket, device } => self.on_device_opened(ticket, device),
            HostEvent::DeviceOpenFailed { ticket, reason } => self.on_open_failed(ticket, reason),
            HostEvent::DeviceStatusChanged(status) => {
                debug!(status = %status, "device status changed");
            }
        }
    }

    /// Tears down any current connection and requests an open of `port`.
    /// Selecting the port that is already bound is a no-op.
    pub fn select(&mut self, port: PortDescriptor) {
        match &self.state {
            ConnectionState::Open { port: bound, .. }
            | ConnectionState::Pending { port: bound, .. }
                if *bound == port =>
            {
                debug!(port = %port, "port already selected");
                return;
            }
            _ => {}
        }

        self.teardown();

        let device = match self.catalog.device(port.device()).cloned() {
            Some(device) if self.catalog.contains(&port) => device,
            _ => {
                self.fail(SessionError::OpenFailed {
                    port,
                    reason: "port is not available".to_string(),
                });
                return;
            }
        };

        self.request_open(port, &device);
    }

    fn request_open(&mut self, port: PortDescriptor, device: &DeviceInfo) {
        self.last_ticket += 1;
        let ticket = OpenTicket(self.last_ticket);

        if let Err(e) = self.host.request_open(device, ticket) {
            self.fail(SessionError::OpenFailed {
                port,
                reason: e.to_string(),
            });
            return;
        }

        info!(port = %port, %ticket, "opening MIDI port");
        self.state = ConnectionState::Pending { port, ticket };
        self.publish_status();
    }

    pub fn disconnect(&mut self) {
        if self.teardown() {
            info!("disconnected");
            self.publish_status();
        }
    }

    pub fn send(&mut self, event: &MidiEvent) -> Result<(), SessionError> {
        self.send_raw(event.encode())
    }

    /// Sends while open, queues while pending, drops otherwise
    pub fn send_raw(&mut self, message: Vec<u8>) -> Result<(), SessionError> {
        match &mut self.state {
            ConnectionState::Open { link, .. } => {
                link.channel
                    .send(&message)
                    .map_err(|e| SessionError::SendFailed { reason: e.to_string() })
            }
            ConnectionState::Pending { .. } => {
                self.queue.enqueue(message);
                Ok(())
            }
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => {
                debug!("discarded packet");
                Ok(())
            }
        }
    }

    /// Sends every event even if some fail; returns the first failure
    pub fn send_all(&mut self, events: impl IntoIterator<Item = MidiEvent>) -> Result<(), SessionError> {
        let mut first_error = None;
        for event in events {
            if let Err(e) = self.send(&event) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn on_device_attached(&mut self, info: DeviceInfo) {
        if self.catalog.on_device_attached(&info) {
            self.subscribers.publish(SessionNotification::CatalogChanged);
        }
    }

    fn on_device_detached(&mut self, info: &DeviceInfo) {
        let removed = self.catalog.on_device_detached(info);
        if removed.is_empty() {
            return;
        }
        self.subscribers.publish(SessionNotification::CatalogChanged);

        let bound = self.state.port().filter(|p| removed.contains(p)).cloned();
        if let Some(port) = bound {
            self.fail(SessionError::DeviceLost { port });
        }
    }

    fn on_device_opened(&mut self, ticket: OpenTicket, mut device: Box<dyn MidiDevice>) {
        let port = match &self.state {
            ConnectionState::Pending { port, ticket: pending } if *pending == ticket => port.clone(),
            _ => {
                debug!(%ticket, "stale open completion, closing device");
                if let Err(e) = device.close() {
                    warn!(%ticket, error = %e, "error when closing stale MIDI device");
                }
                return;
            }
        };

        let mut channel = match device.open_input_port(port.port()) {
            Ok(channel) => channel,
            Err(e) => {
                close_device(device.as_mut(), &port);
                self.fail(SessionError::PortOpenFailed {
                    port,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let failures = self.queue.drain_into(channel.as_mut());
        if failures > 0 {
            warn!(port = %port, failures, "some queued messages could not be replayed");
        }

        info!(port = %port, "MIDI port open");
        self.state = ConnectionState::Open {
            port,
            link: Link { device, channel },
        };
        self.publish_status();
    }

    fn on_open_failed(&mut self, ticket: OpenTicket, reason: String) {
        let port = match &self.state {
            ConnectionState::Pending { port, ticket: pending } if *pending == ticket => port.clone(),
            _ => {
                debug!(%ticket, reason = %reason, "stale open failure ignored");
                return;
            }
        };
        self.fail(SessionError::OpenFailed { port, reason });
    }

    /// Releases handles and clears the queue. Returns whether there was
    /// anything to tear down; a second call is a no-op.
    fn teardown(&mut self) -> bool {
        let previous = mem::replace(&mut self.state, ConnectionState::Disconnected);
        self.queue.clear();
        match previous {
            ConnectionState::Disconnected => false,
            ConnectionState::Open { port, link } => {
                link.close(&port);
                true
            }
            ConnectionState::Pending { .. } | ConnectionState::Failed { .. } => true,
        }
    }

    /// Reports a connection-ending error, then relaxes to `Disconnected`
    fn fail(&mut self, error: SessionError) {
        self.teardown();
        warn!(error = %error, "MIDI connection failed");

        let notice = error.notice();
        if let Some(port) = error.port().cloned() {
            self.state = ConnectionState::Failed {
                port,
                error: error.clone(),
            };
            self.publish_status();
        }
        if let Some(notice) = notice {
            self.subscribers
                .publish(SessionNotification::Error { error, notice });
        }

        self.state = ConnectionState::Disconnected;
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let status = self.state.status();
        self.subscribers
            .publish(SessionNotification::ConnectionState(status));
    }
}

impl Drop for ConnectionController {
    fn drop(&mut self) {
        self.teardown();
    }
}
