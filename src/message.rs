//! Channel and real-time MIDI message types.

use crate::error::MidiError;
use crate::status::{is_one_data_byte_status, is_two_data_byte_status, NOTE_OFF, NOTE_ON, PROGRAM_CHANGE};
use crate::u7::U7;
use std::convert::TryFrom;

/// A channel voice message: note on/off, control change, program
/// change, etc. `status`'s high nibble is the message type, low
/// nibble the channel (0-15). `data2` is zero for messages that only
/// carry one data byte (program change, channel pressure).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMessage {
    pub status: u8,
    pub data1: U7,
    pub data2: U7,
}

impl ChannelMessage {
    pub fn new(status: u8, data1: u8, data2: u8) -> Result<Self, MidiError> {
        if !is_two_data_byte_status(status) && !is_one_data_byte_status(status) {
            return Err(MidiError::InvalidStatus(status));
        }
        Ok(ChannelMessage {
            status,
            data1: U7::try_from(data1)?,
            data2: U7::try_from(data2)?,
        })
    }

    /// Channel 0-15, from the low nibble of `status`.
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// Number of data bytes carried on the wire (1 or 2).
    pub fn data_len(&self) -> u8 {
        if is_two_data_byte_status(self.status) {
            2
        } else {
            1
        }
    }
}

/// A single-byte system real-time message (0xF8..=0xFF). Permitted
/// anywhere in the stream, including mid-SysEx; never alters running
/// status.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RealTimeMessage(pub u8);

impl RealTimeMessage {
    pub fn new(status: u8) -> Result<Self, MidiError> {
        if status < 0xF8 {
            return Err(MidiError::InvalidStatus(status));
        }
        Ok(RealTimeMessage(status))
    }
}

/// Build a note-on `ChannelMessage` for `channel` (0-15).
pub fn note_on(channel: u8, note: u8, velocity: u8) -> Result<ChannelMessage, MidiError> {
    ChannelMessage::new(NOTE_ON | (channel & 0x0F), note, velocity)
}

/// Build a note-off `ChannelMessage` for `channel` (0-15).
pub fn note_off(channel: u8, note: u8, velocity: u8) -> Result<ChannelMessage, MidiError> {
    ChannelMessage::new(NOTE_OFF | (channel & 0x0F), note, velocity)
}

/// Build a program-change `ChannelMessage` for `channel` (0-15).
pub fn program_change(channel: u8, program: u8) -> Result<ChannelMessage, MidiError> {
    ChannelMessage::new(PROGRAM_CHANGE | (channel & 0x0F), program, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_note_on() {
        let msg = ChannelMessage::new(0x92, 0x12, 0x34).unwrap();
        assert_eq!(msg.channel(), 2);
        assert_eq!(msg.data_len(), 2);
    }

    #[test]
    fn builds_program_change() {
        let msg = ChannelMessage::new(0xC5, 0x78, 0x00).unwrap();
        assert_eq!(msg.data_len(), 1);
    }

    #[test]
    fn rejects_system_status() {
        assert!(ChannelMessage::new(0xF0, 0, 0).is_err());
    }

    #[test]
    fn rejects_non_realtime_status() {
        assert!(RealTimeMessage::new(0x90).is_err());
    }

    #[test]
    fn note_on_helper_sets_channel_nibble() {
        let msg = note_on(3, 0x12, 0x34).unwrap();
        assert_eq!(msg.status, 0x93);
        assert_eq!(u8::from(msg.data1), 0x12);
        assert_eq!(u8::from(msg.data2), 0x34);
    }

    #[test]
    fn program_change_helper_zeroes_data2() {
        let msg = program_change(5, 0x78).unwrap();
        assert_eq!(msg.status, 0xC5);
        assert_eq!(u8::from(msg.data2), 0);
    }
}
