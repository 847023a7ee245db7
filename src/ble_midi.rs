//! The `BleMidi` facade: the single object most callers construct,
//! owning the inbound parser, the mutex-guarded outbound packetizer and
//! the flush worker's thread handle. Mirrors the reference
//! `BluetoothMIDI_Interface` class — one object with `begin()`/`Drop`,
//! `parse()`/`update()`, `send*()`/`flush()`, and the `forceMinMTU`/
//! `setTimeout` test hooks.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::MidiError;
use crate::message::ChannelMessage;
use crate::outbound::OutboundPacketizer;
use crate::packet_buffer::DEFAULT_MTU;
use crate::parser::{BleMidiParser, MidiBleReceiver};

fn system_clock_ms() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32
}

/// Owns the inbound parser and the outbound packetizer; the flush
/// worker runs on a dedicated thread started by [`BleMidi::begin`].
pub struct BleMidi {
    parser: BleMidiParser,
    outbound: Arc<OutboundPacketizer>,
    worker: Option<JoinHandle<()>>,
}

impl BleMidi {
    pub fn builder() -> BleMidiBuilder {
        BleMidiBuilder::new()
    }

    /// Start the background flush thread. A no-op if already started.
    pub fn begin(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let outbound = Arc::clone(&self.outbound);
        let handle = thread::Builder::new()
            .name("ble-midi-flush".into())
            .spawn(move || outbound.run_flush_loop())
            .expect("failed to spawn BLE-MIDI flush thread");
        self.worker = Some(handle);
    }

    /// Feed one received BLE packet to the inbound parser.
    pub fn parse(&mut self, packet: &[u8]) {
        self.parser.parse(packet);
    }

    /// Drain queued inbound events to `sink`.
    pub fn update(&mut self, sink: &mut dyn MidiBleReceiver) {
        self.parser.update(sink);
    }

    pub fn send_channel_message(&self, message: ChannelMessage) {
        self.outbound.send_channel_message(message);
    }

    /// `channel` is 1-16 (the "natural" convention used throughout this
    /// crate, see [`crate::channel`]); the wire nibble is `channel - 1`.
    pub fn send_note_on(&self, channel: u8, note: u8, velocity: u8) -> Result<(), MidiError> {
        self.send_channel_message(crate::message::note_on(crate::channel(channel).0, note, velocity)?);
        Ok(())
    }

    pub fn send_note_off(&self, channel: u8, note: u8, velocity: u8) -> Result<(), MidiError> {
        self.send_channel_message(crate::message::note_off(crate::channel(channel).0, note, velocity)?);
        Ok(())
    }

    pub fn send_program_change(&self, channel: u8, program: u8) -> Result<(), MidiError> {
        self.send_channel_message(crate::message::program_change(crate::channel(channel).0, program)?);
        Ok(())
    }

    pub fn send_realtime(&self, status: u8) -> Result<(), MidiError> {
        self.outbound.send_realtime(status)
    }

    /// `bytes` must be `0xF0 ... 0xF7`.
    pub fn send_sysex(&self, bytes: &[u8]) -> Result<(), MidiError> {
        self.outbound.send_sysex(bytes)
    }

    pub fn flush(&self) {
        self.outbound.flush();
    }

    pub fn force_min_mtu(&self, mtu: u16) {
        self.outbound.force_min_mtu(mtu);
    }

    pub fn set_timeout(&self, timeout: Duration) {
        self.outbound.set_timeout(timeout);
    }
}

impl Drop for BleMidi {
    fn drop(&mut self) {
        self.outbound.request_stop();
        match self.worker.take() {
            // the flush thread performs the final emit as part of its
            // own shutdown path (see `OutboundPacketizer::run_flush_loop`).
            Some(handle) => {
                let _ = handle.join();
            }
            // `begin()` was never called: no worker to join, flush here.
            None => self.outbound.flush(),
        }
    }
}

/// Assembles a [`BleMidi`] from a clock, an MTU, a flush timeout and a
/// notify hook. Grounded in the teacher's plain constructor functions
/// (`channel()`, `note_on()`); generalized to a builder since `BleMidi`
/// has several optional knobs with sensible defaults (MTU 23, timeout
/// 10ms per §6) rather than one obvious argument list.
pub struct BleMidiBuilder {
    mtu: u16,
    timeout: Duration,
    clock: Option<Box<dyn Fn() -> u32 + Send>>,
    notify: Option<Box<dyn FnMut(&[u8]) + Send>>,
}

impl BleMidiBuilder {
    pub fn new() -> Self {
        BleMidiBuilder {
            mtu: DEFAULT_MTU,
            timeout: Duration::from_millis(10),
            clock: None,
            notify: None,
        }
    }

    pub fn mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Inject the millisecond clock (`now_ms`); only its low 13 bits are
    /// used. Defaults to the system clock if never called.
    pub fn clock(mut self, clock: impl Fn() -> u32 + Send + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Register the hook called with each completed packet
    /// (`notifyMIDIBLE`). Required before [`build`](Self::build).
    pub fn notify(mut self, notify: impl FnMut(&[u8]) + Send + 'static) -> Self {
        self.notify = Some(Box::new(notify));
        self
    }

    pub fn build(self) -> BleMidi {
        let clock = self.clock.unwrap_or_else(|| Box::new(system_clock_ms));
        let notify = self
            .notify
            .expect("BleMidiBuilder::notify must be set before build()");
        BleMidi {
            parser: BleMidiParser::new(),
            outbound: Arc::new(OutboundPacketizer::new(self.mtu, self.timeout, clock, notify)),
            worker: None,
        }
    }
}

impl Default for BleMidiBuilder {
    fn default() -> Self {
        BleMidiBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Vec<ParsedEvent>,
    }

    impl MidiBleReceiver for RecordingSink {
        fn on_channel_message(&mut self, message: ChannelMessage) {
            self.events.push(ParsedEvent::Channel(message));
        }
        fn on_realtime_message(&mut self, message: crate::message::RealTimeMessage) {
            self.events.push(ParsedEvent::RealTime(message));
        }
        fn on_sysex_message(&mut self, message: crate::sysex::SysExMessage) {
            self.events.push(ParsedEvent::SysEx(message));
        }
    }

    #[test]
    fn destructor_flushes_pending_buffer_without_begin() {
        let packets: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&packets);
        {
            let midi = BleMidi::builder()
                .clock(|| 0x82)
                .notify(move |bytes: &[u8]| recorder.lock().unwrap().push(bytes.to_vec()))
                .build();
            midi.send_note_on(3, 0x12, 0x34).unwrap();
            // dropped without begin(): must still flush once, not panic.
        }
        assert_eq!(*packets.lock().unwrap(), vec![vec![0x81, 0x82, 0x92, 0x12, 0x34]]);
    }

    #[test]
    fn begin_is_idempotent_and_joins_cleanly() {
        let mut midi = BleMidi::builder().clock(|| 0x82).notify(|_| {}).build();
        midi.begin();
        midi.begin();
    }

    #[test]
    fn parse_and_update_roundtrip_a_note_on() {
        let mut midi = BleMidi::builder().clock(|| 0x82).notify(|_| {}).build();
        midi.parse(&[0x81, 0x82, 0x92, 0x12, 0x34]);
        let mut sink = RecordingSink::default();
        midi.update(&mut sink);
        assert_eq!(
            sink.events,
            vec![ParsedEvent::Channel(ChannelMessage::new(0x92, 0x12, 0x34).unwrap())]
        );
    }
}
