//! Public face of the output session.
//!
//! Cloning a `Session` is cheap and every clone drives the same controller.
//! Each call first drains pending host notifications under the controller
//! lock, so state changes are applied in arrival order before the call
//! itself runs.

use crate::config::SessionConfig;
use crate::connection::{ConnectionStatus, PortDescriptor, PortId};
use crate::error::SessionError;
use crate::events::{HostEventReceiver, SessionNotification};
use crate::midi::catalog::PortListing;
use crate::midi::controller::ConnectionController;
use crate::midi::device::MidiHost;
use crate::midi::encoder::{panic_events, reset_events, MidiEvent};
use crossbeam::channel::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Clone)]
pub struct Session {
    controller: Arc<Mutex<ConnectionController>>,
    host_events: HostEventReceiver,
}

impl Session {
    pub fn new(host: impl MidiHost + 'static, host_events: HostEventReceiver) -> Self {
        Self {
            controller: Arc::new(Mutex::new(ConnectionController::new(Box::new(host)))),
            host_events,
        }
    }

    /// Enumerates current devices and reconnects to the last used port if it
    /// is present.
    pub fn start(&self, config: &SessionConfig) {
        let mut controller = self.lock();
        controller.enumerate();

        if let Some(stored) = &config.last_port {
            match controller.find_port(&stored.device, stored.port) {
                Some(port) => {
                    info!(port = %port, "restoring last MIDI port");
                    controller.select(port);
                }
                None => info!(device = %stored.device, "last MIDI port not present"),
            }
        }
    }

    /// Applies queued host notifications. Returns how many were handled.
    pub fn pump(&self) -> usize {
        self.lock().handled
    }

    pub fn subscribe(&self) -> Receiver<SessionNotification> {
        self.lock().subscribe()
    }

    pub fn list_ports(&self) -> PortListing {
        self.lock().list_ports()
    }

    pub fn lookup(&self, id: PortId) -> Option<PortDescriptor> {
        self.lock().lookup(id)
    }

    pub fn select_port(&self, port: &PortDescriptor) {
        self.lock().select(port.clone());
    }

    pub fn disconnect(&self) {
        self.lock().disconnect();
    }

    pub fn send(&self, event: MidiEvent) -> Result<(), SessionError> {
        self.lock().send(&event)
    }

    /// All notes off on every channel
    pub fn panic(&self) -> Result<(), SessionError> {
        self.lock().send_all(panic_events())
    }

    /// Reset all controllers on every channel
    pub fn reset(&self) -> Result<(), SessionError> {
        self.lock().send_all(reset_events())
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status()
    }

    fn lock(&self) -> Pumped<'_> {
        let mut controller = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut handled = 0;
        while let Ok(event) = self.host_events.try_recv() {
            controller.handle(event);
            handled += 1;
        }
        Pumped { controller, handled }
    }
}

/// Controller guard taken after draining host notifications
struct Pumped<'a> {
    controller: MutexGuard<'a, ConnectionController>,
    handled: usize,
}

impl std::ops::Deref for Pumped<'_> {
    type Target = ConnectionController;

    fn deref(&self) -> &Self::Target {
        &self.controller
    }
}

impl std::ops::DerefMut for Pumped<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.controller
    }
}
