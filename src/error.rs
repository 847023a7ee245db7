//! Crate-wide error type.
//!
//! Parse-level errors are all recoverable: the parser logs and
//! resynchronizes rather than surfacing them to `parse()`/`update()`
//! callers. `MidiError` exists for the handful of APIs (mostly
//! construction helpers) that do return a `Result`.

use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MidiError {
    /// Integer value didn't fit the target bit width (e.g. a data byte > 0x7F).
    InvalidInteger,
    /// Byte isn't a valid MIDI status byte.
    InvalidStatus(u8),
    /// First packet byte doesn't match the `10xxxxxx` header pattern.
    InvalidHeader(u8),
    /// A data byte appeared with no active status and no running status.
    UnexpectedDataByte(u8),
    /// Packet ended in the middle of a multi-byte event.
    TruncatedEvent,
    /// SysEx accumulator capacity exceeded; message was discarded.
    SysExOverflow,
    /// Channel outside 0..=15.
    InvalidChannel,
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::InvalidInteger => write!(f, "integer value out of range"),
            MidiError::InvalidStatus(b) => write!(f, "invalid MIDI status byte: {:#04x}", b),
            MidiError::InvalidHeader(b) => write!(f, "invalid BLE-MIDI packet header: {:#04x}", b),
            MidiError::UnexpectedDataByte(b) => {
                write!(f, "data byte {:#04x} with no status in effect", b)
            }
            MidiError::TruncatedEvent => write!(f, "packet ended mid-event"),
            MidiError::SysExOverflow => write!(f, "SysEx message exceeded accumulator capacity"),
            MidiError::InvalidChannel => write!(f, "channel out of range 0..=15"),
        }
    }
}

impl std::error::Error for MidiError {}
