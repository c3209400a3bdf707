//! Structured channel-voice events and their wire encoding.

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    // Controller numbers
    pub const CTL_SUSTAIN: u8 = 64;
    pub const CTL_RESET_ALL_CONTROLLERS: u8 = 121;
    pub const CTL_ALL_NOTES_OFF: u8 = 123;

    pub const PITCH_BEND_CENTER: u16 = 8192;
    pub const PITCH_BEND_MAX: u16 = 16383;
}

use messages::*;

pub const CHANNELS: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOff { channel: u8, note: u8, velocity: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    PolyAftertouch { channel: u8, note: u8, pressure: u8 },
    Controller { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelAftertouch { channel: u8, pressure: u8 },
    /// `value`: unsigned 14-bit, 8192 is center
    PitchBend { channel: u8, value: u16 },
}

impl MidiEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOn { channel, note, velocity }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOff { channel, note, velocity }
    }

    pub fn controller(channel: u8, controller: u8, value: u8) -> Self {
        MidiEvent::Controller { channel, controller, value }
    }

    pub fn program_change(channel: u8, program: u8) -> Self {
        MidiEvent::ProgramChange { channel, program }
    }

    pub fn pitch_bend(channel: u8, value: u16) -> Self {
        MidiEvent::PitchBend { channel, value }
    }

    /// Wire bytes. Channels above 15 clamp to 15, data bytes are masked to
    /// 7 bits and pitch bend is clamped to 14 bits.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiEvent::NoteOff { channel, note, velocity } => {
                vec![status(NOTE_OFF, channel), data(note), data(velocity)]
            }
            MidiEvent::NoteOn { channel, note, velocity } => {
                vec![status(NOTE_ON, channel), data(note), data(velocity)]
            }
            MidiEvent::PolyAftertouch { channel, note, pressure } => {
                vec![status(POLY_AFTERTOUCH, channel), data(note), data(pressure)]
            }
            MidiEvent::Controller { channel, controller, value } => {
                vec![status(CONTROL_CHANGE, channel), data(controller), data(value)]
            }
            MidiEvent::ProgramChange { channel, program } => {
                vec![status(PROGRAM_CHANGE, channel), data(program)]
            }
            MidiEvent::ChannelAftertouch { channel, pressure } => {
                vec![status(CHANNEL_AFTERTOUCH, channel), data(pressure)]
            }
            MidiEvent::PitchBend { channel, value } => {
                let value = value.min(PITCH_BEND_MAX);
                let lsb = (value % 128) as u8;
                let msb = (value / 128) as u8;
                vec![status(PITCH_BEND, channel), lsb, msb]
            }
        }
    }
}

impl From<MidiEvent> for Vec<u8> {
    fn from(event: MidiEvent) -> Self {
        event.encode()
    }
}

fn status(kind: u8, channel: u8) -> u8 {
    kind | channel.min(CHANNELS - 1)
}

fn data(byte: u8) -> u8 {
    byte & 0x7F
}

/// All-notes-off on every channel, ascending
pub fn panic_events() -> impl Iterator<Item = MidiEvent> {
    (0..CHANNELS).map(|ch| MidiEvent::controller(ch, CTL_ALL_NOTES_OFF, 0))
}

/// Reset-all-controllers on every channel, ascending
pub fn reset_events() -> impl Iterator<Item = MidiEvent> {
    (0..CHANNELS).map(|ch| MidiEvent::controller(ch, CTL_RESET_ALL_CONTROLLERS, 0))
}
