use crate::connection::PortDescriptor;
use thiserror::Error;

/// Failures surfaced by the output session.
///
/// Host-level IO errors never leave the controller as-is; they are folded
/// into one of these kinds with the original message kept as `reason`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("could not open MIDI device for {port}: {reason}")]
    OpenFailed { port: PortDescriptor, reason: String },

    #[error("could not open MIDI port {port}: {reason}")]
    PortOpenFailed { port: PortDescriptor, reason: String },

    #[error("MIDI send failed: {reason}")]
    SendFailed { reason: String },

    #[error("MIDI device for {port} was disconnected")]
    DeviceLost { port: PortDescriptor },
}

impl SessionError {
    /// The port the failure is about, if any.
    pub fn port(&self) -> Option<&PortDescriptor> {
        match self {
            SessionError::OpenFailed { port, .. }
            | SessionError::PortOpenFailed { port, .. }
            | SessionError::DeviceLost { port } => Some(port),
            SessionError::SendFailed { .. } => None,
        }
    }

    /// Dialog text shown to the user for connection-ending failures.
    /// Send failures go back to the caller instead.
    pub fn notice(&self) -> Option<ErrorNotice> {
        match self {
            SessionError::OpenFailed { .. } | SessionError::DeviceLost { .. } => {
                Some(ErrorNotice::DEVICE)
            }
            SessionError::PortOpenFailed { .. } => Some(ErrorNotice::PORT),
            SessionError::SendFailed { .. } => None,
        }
    }
}

/// Acknowledge-only title/message pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorNotice {
    pub title: &'static str,
    pub message: &'static str,
}

impl ErrorNotice {
    pub const DEVICE: ErrorNotice = ErrorNotice {
        title: "MIDI device error",
        message: "The selected MIDI device could not be opened or is no longer available.",
    };

    pub const PORT: ErrorNotice = ErrorNotice {
        title: "MIDI port error",
        message: "The selected MIDI port could not be opened.",
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::DeviceId;

    fn port() -> PortDescriptor {
        PortDescriptor::new(DeviceId::new("dev"), 0, "Synth [0]".to_string())
    }

    #[test]
    fn test_notice_mapping() {
        let open = SessionError::OpenFailed { port: port(), reason: "gone".into() };
        let lost = SessionError::DeviceLost { port: port() };
        let port_err = SessionError::PortOpenFailed { port: port(), reason: "busy".into() };
        let send = SessionError::SendFailed { reason: "io".into() };

        assert_eq!(open.notice(), Some(ErrorNotice::DEVICE));
        assert_eq!(lost.notice(), Some(ErrorNotice::DEVICE));
        assert_eq!(port_err.notice(), Some(ErrorNotice::PORT));
        assert_eq!(send.notice(), None);
        assert!(send.port().is_none());
        assert_eq!(lost.port(), Some(&port()));
    }

    #[test]
    fn test_display_includes_label() {
        let err = SessionError::DeviceLost { port: port() };
        assert_eq!(err.to_string(), "MIDI device for Synth [0] was disconnected");
    }
}
