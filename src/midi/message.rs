//! Fixed-frame MIDI message parsing
//!
//! The router only consumes 3-byte channel voice messages; everything else
//! (system messages, running status, truncated frames) is rejected at this
//! boundary as `Unknown` rather than handled defensively downstream.

use std::fmt;

/// A classified 3-byte channel message
///
/// Channels are 1-16. A Note-On with velocity 0 is classified as Note-Off,
/// per the MIDI convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Unknown,
}

impl ChannelMessage {
    /// Parse a raw frame; anything but a recognized 3-byte channel message
    /// yields `Unknown`
    pub fn parse(data: &[u8]) -> Self {
        if data.len() != 3 {
            return ChannelMessage::Unknown;
        }

        let status = data[0];
        if status < 0x80 || status >= 0xF0 {
            return ChannelMessage::Unknown;
        }

        let channel = (status & 0x0F) + 1;
        let data1 = data[1] & 0x7F;
        let data2 = data[2] & 0x7F;

        match status & 0xF0 {
            0x90 if data2 > 0 => ChannelMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            },
            0x90 | 0x80 => ChannelMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            },
            0xB0 => ChannelMessage::ControlChange {
                channel,
                controller: data1,
                value: data2,
            },
            _ => ChannelMessage::Unknown,
        }
    }

    /// Channel (1-16) for recognized messages
    pub fn channel(&self) -> Option<u8> {
        match self {
            ChannelMessage::NoteOn { channel, .. }
            | ChannelMessage::NoteOff { channel, .. }
            | ChannelMessage::ControlChange { channel, .. } => Some(*channel),
            ChannelMessage::Unknown => None,
        }
    }
}

impl fmt::Display for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel, note, velocity)
            }
            ChannelMessage::NoteOff { channel, note, .. } => {
                write!(f, "NoteOff ch:{} n:{}", channel, note)
            }
            ChannelMessage::ControlChange { channel, controller, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel, controller, value)
            }
            ChannelMessage::Unknown => write!(f, "Unknown"),
        }
    }
}
