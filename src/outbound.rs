//! Outbound BLE-MIDI packetizer (§4.3) and its mutex-guarded state (§5).
//!
//! `OutboundPacketizer` owns the single [`PacketBuffer`] a transport
//! writes to, plus the metadata needed to decide, per outgoing message,
//! whether running status and timestamp re-emission let the event be
//! written in fewer bytes, and whether the buffer must be flushed first
//! to make room. All of `send_channel_message`/`send_realtime`/
//! `send_sysex`/`flush`/`force_min_mtu`/`set_timeout` lock the same
//! `Mutex<Inner>`, so `notify` fires with the lock held and emit-then-
//! reset is atomic relative to other senders, matching the teacher's
//! `SpinMutex`-guarded port state generalized to a `std::sync::Mutex`
//! here since this crate targets a host with threads and an allocator.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::MidiError;
use crate::message::ChannelMessage;
use crate::packet_buffer::{PacketBuffer, DEFAULT_MTU, MIN_MTU};
use crate::status::{is_realtime_status, SYSEX_END, SYSEX_START};
use crate::timestamp::Timestamp;

struct Inner {
    buffer: PacketBuffer,
    timeout: Duration,
    clock: Box<dyn Fn() -> u32 + Send>,
    notify: Box<dyn FnMut(&[u8]) + Send>,
    /// Set when the buffer holds unsent bytes with no deadline armed yet;
    /// cleared on every emission. The flush worker sleeps until this.
    deadline: Option<Instant>,
    stop: bool,
}

/// Buffers outbound MIDI messages into BLE-sized packets and hands
/// completed packets to a `notify` callback. Safe to call from any
/// number of producer threads; a cooperating background thread (see
/// [`crate::BleMidi::begin`]) drains the buffer on timeout.
pub struct OutboundPacketizer {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl OutboundPacketizer {
    pub fn new(
        mtu: u16,
        timeout: Duration,
        clock: Box<dyn Fn() -> u32 + Send>,
        notify: Box<dyn FnMut(&[u8]) + Send>,
    ) -> Self {
        OutboundPacketizer {
            inner: Mutex::new(Inner {
                buffer: PacketBuffer::new(mtu),
                timeout,
                clock,
                notify,
                deadline: None,
                stop: false,
            }),
            condvar: Condvar::new(),
        }
    }

    pub fn send_channel_message(&self, message: ChannelMessage) {
        let mut inner = self.inner.lock().unwrap();
        let ts = self.sample_clock(&inner);
        self.append_channel_message(&mut inner, ts, message);
        drop(inner);
        self.condvar.notify_one();
    }

    /// `status` must be a real-time status byte (0xF8..=0xFF); real-time
    /// messages are always preceded by a timestamp-low byte on the wire
    /// and never update running status (§4.3).
    pub fn send_realtime(&self, status: u8) -> Result<(), MidiError> {
        if !is_realtime_status(status) {
            return Err(MidiError::InvalidStatus(status));
        }
        let mut inner = self.inner.lock().unwrap();
        let ts = self.sample_clock(&inner);
        let needed = if inner.buffer.is_empty() { 3 } else { 2 };
        if !inner.buffer.is_empty() && needed > inner.buffer.remaining() {
            self.emit_locked(&mut inner);
        }
        if inner.buffer.is_empty() {
            inner.buffer.open(ts);
        }
        let _ = inner.buffer.push(ts.tslow_byte());
        let _ = inner.buffer.push(status);
        self.arm_deadline(&mut inner);
        drop(inner);
        self.condvar.notify_one();
        Ok(())
    }

    /// `bytes` must be a well-formed SysEx message: `0xF0 ... 0xF7`. May
    /// emit several packets synchronously; the final fragment is left in
    /// the buffer for the flush scheduler/`flush()`/shutdown to emit,
    /// per §4.3 step 5.
    pub fn send_sysex(&self, bytes: &[u8]) -> Result<(), MidiError> {
        if bytes.len() < 2 || bytes[0] != SYSEX_START || bytes[bytes.len() - 1] != SYSEX_END {
            return Err(MidiError::InvalidStatus(bytes.first().copied().unwrap_or(0)));
        }
        let body = &bytes[1..bytes.len() - 1];
        let mut inner = self.inner.lock().unwrap();

        // SysEx always starts a fresh packet (§4.3 step 1).
        if !inner.buffer.is_empty() {
            self.emit_locked(&mut inner);
        }
        // Sampled once for the whole call, not once per packet: the
        // reference implementation calls millis() a single time per send
        // and reuses it for the start header, every continuation packet's
        // header, and the trailing tsLow before 0xF7 alike.
        let ts = self.sample_clock(&inner);
        inner.buffer.open(ts);
        let _ = inner.buffer.push(ts.tslow_byte());
        let _ = inner.buffer.push(SYSEX_START);

        let mut sent = Self::fill_body(&mut inner.buffer, body);
        while sent < body.len() {
            // Packet is full with data remaining: emit it and continue in
            // a continuation packet carrying only a header, no tsLow
            // (§4.3 step 3, resolving the open question in §9).
            self.emit_locked(&mut inner);
            inner.buffer.open(ts);
            sent += Self::fill_body(&mut inner.buffer, &body[sent..]);
        }

        // Final segment: make room for tsLow + SysEx-end if the last
        // continuation packet filled completely.
        if inner.buffer.remaining() < 2 {
            self.emit_locked(&mut inner);
            inner.buffer.open(ts);
        }
        let _ = inner.buffer.push(ts.tslow_byte());
        let _ = inner.buffer.push(SYSEX_END);
        inner.buffer.set_running_status(None);
        self.arm_deadline(&mut inner);
        drop(inner);
        self.condvar.notify_one();
        Ok(())
    }

    /// Force-emit any non-empty buffer.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.emit_locked(&mut inner);
        drop(inner);
        self.condvar.notify_one();
    }

    /// Testing hook: clamp the working MTU. `n` is clamped to `>= 5`.
    pub fn force_min_mtu(&self, mtu: u16) {
        let mtu = mtu.max(MIN_MTU);
        let mut inner = self.inner.lock().unwrap();
        inner.buffer.set_mtu(mtu);
    }

    /// Set the flush-scheduler dwell time. A zero duration means "flush
    /// immediately when idle" (§5).
    pub fn set_timeout(&self, timeout: Duration) {
        let mut inner = self.inner.lock().unwrap();
        inner.timeout = timeout;
    }

    /// Signal the flush worker to perform its final flush and exit.
    pub(crate) fn request_stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.stop = true;
        drop(inner);
        self.condvar.notify_one();
    }

    /// Runs on the dedicated flush thread until [`request_stop`] fires,
    /// at which point it performs one final flush and returns (§4.4, §5).
    pub(crate) fn run_flush_loop(&self) {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if inner.stop {
                self.emit_locked(&mut inner);
                return;
            }
            match inner.deadline {
                None => inner = self.condvar.wait(inner).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.emit_locked(&mut inner);
                        continue;
                    }
                    let (guard, result) =
                        self.condvar.wait_timeout(inner, deadline - now).unwrap();
                    inner = guard;
                    if result.timed_out() {
                        if let Some(d) = inner.deadline {
                            if Instant::now() >= d {
                                self.emit_locked(&mut inner);
                            }
                        }
                    }
                }
            }
        }
    }

    fn sample_clock(&self, inner: &Inner) -> Timestamp {
        Timestamp::now(|| (inner.clock)())
    }

    fn append_channel_message(&self, inner: &mut Inner, ts: Timestamp, message: ChannelMessage) {
        let data_len = message.data_len() as usize;
        if !inner.buffer.is_empty() {
            let needed = Self::bytes_needed(&inner.buffer, ts, message.status, data_len);
            if needed > inner.buffer.remaining() {
                self.emit_locked(inner);
            }
        }
        if inner.buffer.is_empty() {
            inner.buffer.open(ts);
        }

        let same_status = inner.buffer.running_status() == Some(message.status);
        let same_timestamp = same_status && ts.low7() == inner.buffer.prev_timestamp_low();
        if !same_status {
            let _ = inner.buffer.push(ts.tslow_byte());
            let _ = inner.buffer.push(message.status);
        } else if !same_timestamp {
            let _ = inner.buffer.push(ts.tslow_byte());
        }
        let _ = inner.buffer.push(u8::from(message.data1));
        if data_len == 2 {
            let _ = inner.buffer.push(u8::from(message.data2));
        }
        inner.buffer.set_running_status(Some(message.status));
        inner.buffer.set_prev_timestamp_low(ts.low7());
        self.arm_deadline(inner);
    }

    /// Bytes a channel event would cost if appended to `buffer` right now
    /// (§4.3 step 3): just the data bytes under running status with an
    /// unchanged timestamp, `tsLow` + data if only the timestamp or
    /// status changed, or the full `tsLow` + status + data otherwise.
    fn bytes_needed(buffer: &PacketBuffer, ts: Timestamp, status: u8, data_len: usize) -> usize {
        let same_status = buffer.running_status() == Some(status);
        let same_timestamp = same_status && ts.low7() == buffer.prev_timestamp_low();
        if same_timestamp {
            data_len
        } else if same_status {
            1 + data_len
        } else {
            1 + 1 + data_len
        }
    }

    fn fill_body(buffer: &mut PacketBuffer, data: &[u8]) -> usize {
        let mut written = 0;
        for &byte in data {
            if !buffer.push(byte) {
                break;
            }
            written += 1;
        }
        written
    }

    fn emit_locked(&self, inner: &mut Inner) {
        if inner.buffer.is_empty() {
            return;
        }
        let bytes = inner.buffer.take();
        (inner.notify)(&bytes);
        inner.deadline = None;
    }

    fn arm_deadline(&self, inner: &mut Inner) {
        if inner.deadline.is_none() {
            inner.deadline = Some(Instant::now() + inner.timeout);
        }
    }
}

impl Default for OutboundPacketizer {
    fn default() -> Self {
        OutboundPacketizer::new(
            DEFAULT_MTU,
            Duration::from_millis(10),
            Box::new(|| 0),
            Box::new(|_bytes: &[u8]| {}),
        )
    }
}
