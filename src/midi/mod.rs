pub mod catalog;
pub mod controller;
pub mod device;
pub mod encoder;
pub mod midir_host;
pub mod monitor;
pub mod queue;
pub mod session;

#[cfg(test)]
pub(crate) mod mock;

pub use encoder::MidiEvent;
pub use midir_host::MidirHost;
pub use monitor::DeviceWatcher;
pub use session::Session;
