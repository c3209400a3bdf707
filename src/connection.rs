use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identity of a MIDI device across enumerations
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Synthetic key handed to the presentation layer instead of widget identity.
/// Assigned by the catalog in attach order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One selectable output endpoint: an input port on an external device.
///
/// Equality and hashing only look at `(device, port)`; the label is display
/// metadata.
#[derive(Debug, Clone)]
pub struct PortDescriptor {
    device: DeviceId,
    port: u32,
    label: String,
}

impl PortDescriptor {
    pub fn new(device: DeviceId, port: u32, label: String) -> Self {
        Self { device, port, label }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether this descriptor addresses the given persisted port identity
    pub fn is_same_endpoint(&self, device: &str, port: u32) -> bool {
        self.device.as_str() == device && self.port == port
    }
}

impl PartialEq for PortDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.device == other.device && self.port == other.port
    }
}

impl Eq for PortDescriptor {}

impl Hash for PortDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.device.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Observer-facing view of the connection state. Carries no handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Pending(PortDescriptor),
    Open(PortDescriptor),
    Failed(PortDescriptor, String),
}

impl ConnectionStatus {
    pub fn port(&self) -> Option<&PortDescriptor> {
        match self {
            ConnectionStatus::Disconnected => None,
            ConnectionStatus::Pending(port)
            | ConnectionStatus::Open(port)
            | ConnectionStatus::Failed(port, _) => Some(port),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionStatus::Open(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Pending(port) => write!(f, "connecting to {}", port),
            ConnectionStatus::Open(port) => write!(f, "connected to {}", port),
            ConnectionStatus::Failed(port, err) => write!(f, "ERR {}: {}", port, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_descriptor_equality_ignores_label() {
        let a = PortDescriptor::new(DeviceId::new("usb-1"), 0, "Piano [0]".into());
        let b = PortDescriptor::new(DeviceId::new("usb-1"), 0, "Renamed [0]".into());
        let c = PortDescriptor::new(DeviceId::new("usb-1"), 1, "Piano [1]".into());

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_status_display() {
        let port = PortDescriptor::new(DeviceId::new("d"), 2, "Synth [2]".into());
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(
            ConnectionStatus::Open(port.clone()).to_string(),
            "connected to Synth [2]"
        );
        assert_eq!(
            ConnectionStatus::Pending(port.clone()).port(),
            Some(&port)
        );
        assert!(port.is_same_endpoint("d", 2));
        assert!(!port.is_same_endpoint("d", 0));
    }
}
