/// Hot-plug detection by polling.
/// midir has no device notifications and caches nothing useful between
/// clients, so a fresh client enumerates the ports every interval and the
/// difference to the previous scan is posted as attach/detach events.
use crate::events::{HostEvent, HostEventSender};
use crate::midi::device::DeviceInfo;
use crate::midi::midir_host::enumerate_devices;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Stops the polling thread when dropped
pub struct DeviceWatcher {
    running: Arc<AtomicBool>,
}

impl DeviceWatcher {
    /// `known` is the device set the session already enumerated
    pub fn start(events: HostEventSender, known: Vec<DeviceInfo>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        thread::Builder::new()
            .name("midi-monitor".to_string())
            .spawn(move || {
                let mut previous = known;

                while flag.load(Ordering::Relaxed) {
                    thread::sleep(POLL_INTERVAL);

                    let current = match enumerate_devices() {
                        Ok(devices) => devices,
                        Err(e) => {
                            warn!(error = %e, "device scan failed");
                            let status = HostEvent::DeviceStatusChanged(format!("device scan failed: {}", e));
                            if events.send(status).is_err() {
                                return;
                            }
                            continue;
                        }
                    };

                    for event in diff_devices(&previous, &current) {
                        debug!(?event, "hotplug");
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                    previous = current;
                }
            })?;

        Ok(Self { running })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for DeviceWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Detach events for vanished devices, then attach events for new ones
pub fn diff_devices(previous: &[DeviceInfo], current: &[DeviceInfo]) -> Vec<HostEvent> {
    let removed = previous
        .iter()
        .filter(|old| !current.iter().any(|d| d.id == old.id))
        .map(|old| HostEvent::DeviceDetached(old.clone()));

    let added = current
        .iter()
        .filter(|new| !previous.iter().any(|d| d.id == new.id))
        .map(|new| HostEvent::DeviceAttached(new.clone()));

    removed.chain(added).collect()
}
