use crate::config::SessionConfig;
use crate::connection::{ConnectionStatus, PortDescriptor};
use crate::error::ErrorNotice;
use crate::events::{host_channel, SessionNotification};
use crate::midi::catalog::PortListing;
use crate::midi::encoder::messages::{CTL_SUSTAIN, PITCH_BEND_CENTER, PITCH_BEND_MAX};
use crate::midi::midir_host::enumerate_devices;
use crate::midi::{DeviceWatcher, MidiEvent, MidirHost, Session};
use crossbeam::channel::Receiver;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const MAX_LOG_MESSAGES: usize = 100;

/// Terminals report key presses only, so notes are released after this
const NOTE_HOLD: Duration = Duration::from_millis(300);

const BEND_STEP: u16 = 1024;

/// Bottom letter row is the white keys, the row above it the black keys
const KEY_MAP: [(char, u8); 17] = [
    ('z', 0), ('s', 1), ('x', 2), ('d', 3), ('c', 4), ('v', 5), ('g', 6),
    ('b', 7), ('h', 8), ('n', 9), ('j', 10), ('m', 11), (',', 12), ('l', 13),
    ('.', 14), (';', 15), ('/', 16),
];

/// Semitone offset from the current octave's C for a key, if it is a note key
pub fn note_offset(key: char) -> Option<u8> {
    KEY_MAP
        .iter()
        .find(|(k, _)| *k == key.to_ascii_lowercase())
        .map(|(_, offset)| *offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneFocus {
    Ports,
    Keyboard,
}

/// Live performance settings shown in the keyboard pane
#[derive(Debug, Clone, Copy)]
pub struct Performance {
    pub channel: u8,
    pub octave: u8,
    pub velocity: u8,
    pub program: u8,
    pub bend: u16,
    pub sustain: bool,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            channel: 0,
            octave: 5,
            velocity: 100,
            program: 0,
            bend: PITCH_BEND_CENTER,
            sustain: false,
        }
    }
}

pub struct App {
    pub ports: PortListing,
    /// Row in the port pane; 0 is the "Disconnected" entry
    pub selected_row: usize,
    pub focus: PaneFocus,
    pub status: ConnectionStatus,
    pub dialog: Option<ErrorNotice>,
    pub perf: Performance,
    pub held_notes: Vec<(u8, Instant)>,
    pub log_messages: VecDeque<String>,
    pub should_quit: bool,

    config_path: PathBuf,
    config: SessionConfig,
    session: Session,
    notifications: Receiver<SessionNotification>,
    _watcher: Option<DeviceWatcher>,
}

struct Wiring {
    session: Session,
    notifications: Receiver<SessionNotification>,
    watcher: Option<DeviceWatcher>,
}

fn build_session(config: &SessionConfig) -> Wiring {
    let (host_tx, host_rx) = host_channel();
    let session = Session::new(MidirHost::new(host_tx.clone()), host_rx);
    let notifications = session.subscribe();

    let known = enumerate_devices().unwrap_or_default();
    session.start(config);

    let watcher = match DeviceWatcher::start(host_tx, known) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!(error = %e, "hotplug monitoring unavailable");
            None
        }
    };

    Wiring {
        session,
        notifications,
        watcher,
    }
}

impl App {
    pub fn new(config_path: PathBuf, config: SessionConfig) -> Self {
        let wiring = build_session(&config);
        Self::with_wiring(config_path, config, wiring)
    }

    fn with_wiring(config_path: PathBuf, config: SessionConfig, wiring: Wiring) -> Self {
        let mut app = Self {
            ports: PortListing::default(),
            selected_row: 0,
            focus: PaneFocus::Keyboard,
            status: ConnectionStatus::Disconnected,
            dialog: None,
            perf: Performance::default(),
            held_notes: Vec::new(),
            log_messages: VecDeque::new(),
            should_quit: false,
            config_path,
            config,
            session: wiring.session,
            notifications: wiring.notifications,
            _watcher: wiring.watcher,
        };

        app.refresh_ports();
        if app.ports.is_empty() {
            app.add_log("No MIDI devices found. Connect a device or start a software synth.".to_string());
        } else {
            app.add_log(format!("Found {} output port(s)", app.ports.len()));
        }
        app
    }

    pub fn process_events(&mut self) {
        self.session.pump();

        while let Ok(notification) = self.notifications.try_recv() {
            match notification {
                SessionNotification::ConnectionState(status) => {
                    self.add_log(status.to_string());
                    if let ConnectionStatus::Open(port) = &status {
                        self.remember_port(Some(port));
                    }
                    self.status = status;
                }
                SessionNotification::CatalogChanged => {
                    self.refresh_ports();
                }
                SessionNotification::Error { error, notice } => {
                    self.add_log(format!("ERROR: {}", error));
                    self.dialog = Some(notice);
                }
            }
        }

        self.release_expired_notes(Instant::now());
    }

    fn refresh_ports(&mut self) {
        self.ports = self.session.list_ports();
        self.selected_row = self.selected_row.min(self.ports.len());
    }

    fn add_log(&mut self, msg: String) {
        self.log_messages.push_back(msg);
        if self.log_messages.len() > MAX_LOG_MESSAGES {
            self.log_messages.pop_front();
        }
    }

    fn remember_port(&mut self, port: Option<&PortDescriptor>) {
        let updated = self.config.with_last_port(port);
        if updated == self.config {
            return;
        }
        match updated.save(&self.config_path) {
            Ok(()) => self.config = updated,
            Err(e) => self.add_log(format!("ERROR: could not save settings: {:#}", e)),
        }
    }

    /// Row of the port the session is bound to, 0 when disconnected
    pub fn bound_row(&self) -> usize {
        self.status
            .port()
            .and_then(|port| self.ports.position(port))
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    fn send(&mut self, event: MidiEvent) {
        if let Err(e) = self.session.send(event) {
            self.add_log(format!("ERROR: {}", e));
        }
    }

    // Keyboard input handlers

    pub fn handle_tab(&mut self) {
        self.focus = match self.focus {
            PaneFocus::Ports => PaneFocus::Keyboard,
            PaneFocus::Keyboard => PaneFocus::Ports,
        };
    }

    pub fn handle_key_up(&mut self) {
        match self.focus {
            PaneFocus::Ports => self.selected_row = self.selected_row.saturating_sub(1),
            PaneFocus::Keyboard => {
                self.perf.velocity = (self.perf.velocity + 8).min(127);
            }
        }
    }

    pub fn handle_key_down(&mut self) {
        match self.focus {
            PaneFocus::Ports => {
                if self.selected_row < self.ports.len() {
                    self.selected_row += 1;
                }
            }
            PaneFocus::Keyboard => {
                self.perf.velocity = self.perf.velocity.saturating_sub(8).max(1);
            }
        }
    }

    pub fn handle_key_left(&mut self) {
        if self.focus == PaneFocus::Keyboard {
            self.perf.octave = self.perf.octave.saturating_sub(1);
        }
    }

    pub fn handle_key_right(&mut self) {
        if self.focus == PaneFocus::Keyboard {
            self.perf.octave = (self.perf.octave + 1).min(9);
        }
    }

    pub fn handle_enter(&mut self) {
        if self.dialog.take().is_some() {
            return;
        }
        if self.focus != PaneFocus::Ports {
            return;
        }

        if self.selected_row == 0 {
            self.disconnect();
            return;
        }
        if !self.config.routes_through_system() {
            self.add_log(format!("Output mode '{}' has no system MIDI port", self.config.output_mode));
            return;
        }

        let port = self
            .ports
            .get(self.selected_row - 1)
            .and_then(|entry| self.session.lookup(entry.id));
        match port {
            Some(port) => {
                info!(port = %port, "port selected");
                if self.status.port() != Some(&port) {
                    self.silence();
                }
                self.session.select_port(&port);
            }
            None => self.add_log("Port is no longer available".to_string()),
        }
    }

    pub fn disconnect(&mut self) {
        self.silence();
        self.session.disconnect();
        self.remember_port(None);
    }

    pub fn handle_escape(&mut self) {
        self.dialog = None;
    }

    /// Note keys in the keyboard pane; `d` disconnects in the port pane
    pub fn handle_char(&mut self, c: char) {
        match c {
            'q' => return self.quit(),
            'p' => return self.handle_panic(),
            'r' => return self.handle_reset(),
            _ => {}
        }

        match self.focus {
            PaneFocus::Ports => {
                if c == 'd' {
                    self.disconnect();
                }
            }
            PaneFocus::Keyboard => {
                if let Some(offset) = note_offset(c) {
                    let note = (self.perf.octave as u16 * 12 + offset as u16).min(127) as u8;
                    self.play(note, Instant::now());
                } else {
                    match c {
                        ' ' => self.toggle_sustain(),
                        '+' | '=' => self.change_program(1),
                        '-' => self.change_program(-1),
                        '[' => self.bend(-(BEND_STEP as i32)),
                        ']' => self.bend(BEND_STEP as i32),
                        '\\' => self.bend(0),
                        _ => {}
                    }
                }
            }
        }
    }

    fn play(&mut self, note: u8, now: Instant) {
        let channel = self.perf.channel;
        if let Some(pos) = self.held_notes.iter().position(|(n, _)| *n == note) {
            self.held_notes.remove(pos);
            self.send(MidiEvent::note_off(channel, note, 0));
        }
        self.send(MidiEvent::note_on(channel, note, self.perf.velocity));
        self.held_notes.push((note, now));
    }

    fn release_expired_notes(&mut self, now: Instant) {
        let channel = self.perf.channel;
        let (expired, held): (Vec<_>, Vec<_>) = self
            .held_notes
            .drain(..)
            .partition(|(_, at)| now.duration_since(*at) >= NOTE_HOLD);
        self.held_notes = held;
        for (note, _) in expired {
            self.send(MidiEvent::note_off(channel, note, 0));
        }
    }

    fn release_all_notes(&mut self) {
        let channel = self.perf.channel;
        for (note, _) in std::mem::take(&mut self.held_notes) {
            self.send(MidiEvent::note_off(channel, note, 0));
        }
    }

    /// Ends held notes and sustain on the current port before it goes away
    fn silence(&mut self) {
        self.release_all_notes();
        if self.perf.sustain {
            self.perf.sustain = false;
            self.send(MidiEvent::controller(self.perf.channel, CTL_SUSTAIN, 0));
        }
    }

    fn toggle_sustain(&mut self) {
        self.perf.sustain = !self.perf.sustain;
        let value = if self.perf.sustain { 127 } else { 0 };
        self.send(MidiEvent::controller(self.perf.channel, CTL_SUSTAIN, value));
    }

    fn change_program(&mut self, delta: i16) {
        self.perf.program = (self.perf.program as i16 + delta).clamp(0, 127) as u8;
        self.send(MidiEvent::program_change(self.perf.channel, self.perf.program));
    }

    /// Moves the bend by `delta`; zero re-centers it
    fn bend(&mut self, delta: i32) {
        self.perf.bend = if delta == 0 {
            PITCH_BEND_CENTER
        } else {
            (self.perf.bend as i32 + delta).clamp(0, PITCH_BEND_MAX as i32) as u16
        };
        self.send(MidiEvent::pitch_bend(self.perf.channel, self.perf.bend));
    }

    pub fn handle_panic(&mut self) {
        self.held_notes.clear();
        match self.session.panic() {
            Ok(()) => self.add_log("All notes off".to_string()),
            Err(e) => self.add_log(format!("ERROR: {}", e)),
        }
    }

    pub fn handle_reset(&mut self) {
        self.perf.bend = PITCH_BEND_CENTER;
        self.perf.sustain = false;
        match self.session.reset() {
            Ok(()) => self.add_log("Controllers reset".to_string()),
            Err(e) => self.add_log(format!("ERROR: {}", e)),
        }
    }

    /// Re-reads the settings file and rebuilds the session when the snapshot
    /// differs from the running one.
    pub fn handle_reload(&mut self) {
        let fresh = match SessionConfig::load(&self.config_path) {
            Ok(config) => config,
            Err(e) => {
                self.add_log(format!("ERROR: {:#}", e));
                return;
            }
        };

        if fresh == self.config {
            self.add_log("Settings unchanged".to_string());
            return;
        }

        self.silence();
        self.session.disconnect();

        if !fresh.routes_through_system() {
            self.add_log(format!(
                "Output mode '{}' is not handled by this keyboard; MIDI output stays off",
                fresh.output_mode
            ));
            self.config = fresh;
            return;
        }

        // Drop the old watcher before the new one starts polling
        self._watcher = None;
        let wiring = build_session(&fresh);
        self.session = wiring.session;
        self.notifications = wiring.notifications;
        self._watcher = wiring.watcher;
        self.config = fresh;
        self.status = self.session.status();
        self.refresh_ports();
        self.add_log("Settings reloaded".to_string());
    }

    pub fn quit(&mut self) {
        self.silence();
        self.session.disconnect();
        self.should_quit = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{HostEvent, HostEventSender};
    use crate::midi::mock::{device, HostLog, MockDevice, MockHost};
    use tempfile::TempDir;

    struct Fixture {
        app: App,
        host_tx: HostEventSender,
        log: HostLog,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let (host, log) = MockHost::new();
        let (host_tx, host_rx) = host_channel();
        let session = Session::new(host, host_rx);
        let wiring = Wiring {
            notifications: session.subscribe(),
            session,
            watcher: None,
        };

        let dir = TempDir::new().unwrap();
        let app = App::with_wiring(dir.path().join("vkeys.toml"), SessionConfig::default(), wiring);
        Fixture { app, host_tx, log, _dir: dir }
    }

    impl Fixture {
        fn attach(&mut self, id: &str, name: &str) {
            self.host_tx
                .send(HostEvent::DeviceAttached(device(id, name, 1)))
                .unwrap();
            self.app.process_events();
        }

        fn connect_row(&mut self, row: usize, id: &str) {
            self.app.focus = PaneFocus::Ports;
            self.app.selected_row = row;
            self.app.handle_enter();
            let ticket = self.log.last_ticket();
            self.host_tx
                .send(HostEvent::DeviceOpened {
                    ticket,
                    device: Box::new(MockDevice::new(id, &self.log)),
                })
                .unwrap();
            self.app.process_events();
        }
    }

    #[test]
    fn test_switching_ports_releases_notes_and_sustain() {
        let mut f = fixture();
        f.attach("a", "A");
        f.attach("b", "B");
        f.connect_row(1, "a");
        assert!(f.app.status.is_open());

        f.app.focus = PaneFocus::Keyboard;
        f.app.handle_char('z');
        f.app.handle_char(' ');
        assert!(f.app.perf.sustain);

        f.app.focus = PaneFocus::Ports;
        f.app.selected_row = 2;
        f.app.handle_enter();

        assert_eq!(
            f.log.channel(0).sent(),
            vec![
                vec![0x90, 60, 100],
                vec![0xB0, CTL_SUSTAIN, 127],
                vec![0x80, 60, 0],
                vec![0xB0, CTL_SUSTAIN, 0],
            ]
        );
        assert!(f.log.channel(0).is_closed());
        assert!(f.app.held_notes.is_empty());
        assert!(!f.app.perf.sustain);
        let requested: Vec<String> = f.log.open_requests().into_iter().map(|(d, _)| d).collect();
        assert_eq!(requested, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_reselecting_bound_port_keeps_notes() {
        let mut f = fixture();
        f.attach("a", "A");
        f.connect_row(1, "a");

        f.app.focus = PaneFocus::Keyboard;
        f.app.handle_char('z');

        f.app.focus = PaneFocus::Ports;
        f.app.selected_row = 1;
        f.app.handle_enter();

        assert_eq!(f.log.channel(0).sent(), vec![vec![0x90, 60, 100]]);
        assert_eq!(f.app.held_notes.len(), 1);
        assert!(!f.log.channel(0).is_closed());
    }

    #[test]
    fn test_note_offsets() {
        assert_eq!(note_offset('z'), Some(0));
        assert_eq!(note_offset('m'), Some(11));
        assert_eq!(note_offset(','), Some(12));
        assert_eq!(note_offset('Z'), Some(0));
        assert_eq!(note_offset('/'), Some(16));
        assert_eq!(note_offset('a'), None);
        assert_eq!(note_offset('q'), None);
        assert_eq!(note_offset('p'), None);
        assert_eq!(note_offset('r'), None);
    }

    #[test]
    fn test_key_map_has_no_duplicate_keys() {
        for (i, (key, _)) in KEY_MAP.iter().enumerate() {
            assert!(!KEY_MAP[i + 1..].iter().any(|(k, _)| k == key), "{key} mapped twice");
        }
    }
}
