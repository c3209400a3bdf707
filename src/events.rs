use crate::connection::ConnectionStatus;
use crate::error::{ErrorNotice, SessionError};
use crate::midi::device::{DeviceInfo, MidiDevice};
use crossbeam::channel::{Receiver, Sender};
use std::fmt;

/// Sequence number of an open request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpenTicket(pub u64);

impl fmt::Display for OpenTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "open#{}", self.0)
    }
}

/// Notifications from the host MIDI subsystem
pub enum HostEvent {
    DeviceAttached(DeviceInfo),

    DeviceDetached(DeviceInfo),

    /// Outcome of `MidiHost::request_open`
    DeviceOpened {
        ticket: OpenTicket,
        device: Box<dyn MidiDevice>,
    },

    DeviceOpenFailed {
        ticket: OpenTicket,
        reason: String,
    },

    /// Informational only
    DeviceStatusChanged(String),
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::DeviceAttached(info) => f.debug_tuple("DeviceAttached").field(&info.id).finish(),
            HostEvent::DeviceDetached(info) => f.debug_tuple("DeviceDetached").field(&info.id).finish(),
            HostEvent::DeviceOpened { ticket, .. } => {
                f.debug_struct("DeviceOpened").field("ticket", ticket).finish_non_exhaustive()
            }
            HostEvent::DeviceOpenFailed { ticket, reason } => f
                .debug_struct("DeviceOpenFailed")
                .field("ticket", ticket)
                .field("reason", reason)
                .finish(),
            HostEvent::DeviceStatusChanged(status) => {
                f.debug_tuple("DeviceStatusChanged").field(status).finish()
            }
        }
    }
}

pub type HostEventSender = Sender<HostEvent>;
pub type HostEventReceiver = Receiver<HostEvent>;

/// Channel the host posts its notifications into
pub fn host_channel() -> (HostEventSender, HostEventReceiver) {
    crossbeam::channel::unbounded()
}

/// Events published by the session to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// Connection state changed
    ConnectionState(ConnectionStatus),

    /// Port list changed (hotplug)
    CatalogChanged,

    /// Connection-ending failure; shown to the user and acknowledged
    Error {
        error: SessionError,
        notice: ErrorNotice,
    },
}

/// Fan-out of session notifications. Dropped receivers are pruned on the
/// next publish.
#[derive(Debug, Default)]
pub struct Subscribers {
    senders: Vec<Sender<SessionNotification>>,
}

impl Subscribers {
    pub fn subscribe(&mut self) -> Receiver<SessionNotification> {
        let (tx, rx) = crossbeam::channel::unbounded();
        self.senders.push(tx);
        rx
    }

    pub fn publish(&mut self, notification: SessionNotification) {
        self.senders.retain(|tx| tx.send(notification.clone()).is_ok());
    }
}
