//! MIDI status byte classification shared by the inbound parser and
//! outbound packetizer.

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const POLY_PRESSURE: u8 = 0xA0;
pub const CONTROL_CHANGE: u8 = 0xB0;
pub const PROGRAM_CHANGE: u8 = 0xC0;
pub const CHANNEL_PRESSURE: u8 = 0xD0;
pub const PITCH_BEND: u8 = 0xE0;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

pub const REALTIME_START: u8 = 0xF8;

/// Two-byte channel voice messages (status + data1 + data2).
pub fn is_two_data_byte_status(status: u8) -> bool {
    matches!(
        status & 0xF0,
        NOTE_OFF | NOTE_ON | POLY_PRESSURE | CONTROL_CHANGE | PITCH_BEND
    )
}

/// One-byte channel voice messages (status + data1 only).
pub fn is_one_data_byte_status(status: u8) -> bool {
    matches!(status & 0xF0, PROGRAM_CHANGE | CHANNEL_PRESSURE)
}

/// Any channel voice status byte (0x80..=0xEF).
pub fn is_channel_status(byte: u8) -> bool {
    (NOTE_OFF..SYSEX_START).contains(&byte)
}

/// Real-time status bytes are single-byte messages permitted anywhere
/// in the stream, including mid-SysEx, and never affect running status.
pub fn is_realtime_status(byte: u8) -> bool {
    byte >= REALTIME_START
}

/// The single-byte SysEx terminator.
pub fn is_sysex_end(byte: u8) -> bool {
    byte == SYSEX_END
}

/// Any byte with the high bit set is a status or timestamp byte, never
/// a MIDI data byte.
pub fn is_status_or_timestamp(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Number of data bytes that follow a channel voice status byte.
/// Returns `None` for non-channel-voice status bytes.
pub fn channel_data_len(status: u8) -> Option<u8> {
    if is_two_data_byte_status(status) {
        Some(2)
    } else if is_one_data_byte_status(status) {
        Some(1)
    } else {
        None
    }
}
