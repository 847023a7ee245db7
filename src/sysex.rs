//! SysEx accumulator: a fixed-capacity buffer holding bytes between an
//! opening `0xF0` and closing `0xF7`, surviving across packet
//! boundaries (§4.2).

use crate::error::MidiError;
use crate::status::{SYSEX_END, SYSEX_START};
use heapless::Vec as HVec;

/// Matches `original_source`'s Control-Surface accumulator size; large
/// enough for the full-frame MTC and MMC sequences this corpus cares
/// about, small enough to bound worst-case memory on an embedded host.
pub const SYSEX_CAPACITY: usize = 256;

/// A complete, well-formed SysEx message: `0xF0 ... 0xF7`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SysExMessage(pub HVec<u8, SYSEX_CAPACITY>);

impl SysExMessage {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Accumulates SysEx body bytes across one or more `parse()` calls.
#[derive(Default)]
pub struct SysExAccumulator {
    buf: HVec<u8, SYSEX_CAPACITY>,
}

impl SysExAccumulator {
    pub fn begin(&mut self) {
        self.buf.clear();
        let _ = self.buf.push(SYSEX_START);
    }

    /// Reserves one byte of headroom for the `0xF7` terminator `finish`
    /// writes, so a body that runs right up to `SYSEX_CAPACITY` can't
    /// silently lose its terminator the way an unchecked push at
    /// `finish`-time would.
    pub fn push(&mut self, byte: u8) -> Result<(), MidiError> {
        if self.buf.len() >= SYSEX_CAPACITY - 1 {
            return Err(MidiError::SysExOverflow);
        }
        self.buf.push(byte).map_err(|_| MidiError::SysExOverflow)
    }

    pub fn finish(&mut self) -> Result<SysExMessage, MidiError> {
        self.buf.push(SYSEX_END).map_err(|_| MidiError::SysExOverflow)?;
        let message = SysExMessage(self.buf.clone());
        self.buf.clear();
        Ok(message)
    }

    pub fn discard(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_finishes() {
        let mut acc = SysExAccumulator::default();
        acc.begin();
        acc.push(0x01).unwrap();
        acc.push(0x02).unwrap();
        let msg = acc.finish().unwrap();
        assert_eq!(msg.bytes(), &[0xF0, 0x01, 0x02, 0xF7]);
    }

    #[test]
    fn overflow_is_reported() {
        let mut acc = SysExAccumulator::default();
        acc.begin();
        for _ in 0..SYSEX_CAPACITY {
            if acc.push(0x01).is_err() {
                return;
            }
        }
        panic!("expected overflow before filling capacity");
    }

    #[test]
    fn body_filling_every_reserved_slot_still_terminates() {
        // begin() uses 1 slot (0xF0); push() reserves 1 for the terminator,
        // so exactly SYSEX_CAPACITY - 2 body bytes should be acceptable and
        // finish() must still append 0xF7 rather than silently dropping it.
        let mut acc = SysExAccumulator::default();
        acc.begin();
        for _ in 0..SYSEX_CAPACITY - 2 {
            acc.push(0x01).unwrap();
        }
        let msg = acc.finish().unwrap();
        assert_eq!(msg.bytes().last(), Some(&SYSEX_END));
        assert_eq!(msg.bytes().len(), SYSEX_CAPACITY);
    }
}
