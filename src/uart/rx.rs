//! Serial receiver.
//!
//! Re-synchronizes on the falling edge of the start bit and samples each
//! bit at its estimated center using 16x oversampling. The edge detector
//! runs every driving-clock step, independent of the tick; the half-bit
//! offset applied after the edge is what lands later samples near bit
//! centers without any shared phase reference with the sender.
//!
//! By default the line is taken at face value: any momentary space starts
//! a frame and the stop bit is never inspected, so line anomalies fail
//! silently into garbled bytes. [`Checks`] turns on detection without
//! changing the timing.

use crate::uart::{DATA_BITS, FIFO_DEPTH, OVERSAMPLE};
use circular_buffer::CircularBuffer;
use log::*;
use std::fmt;
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::register_bitfields;
use tock_registers::registers::InMemoryRegister;

/// A completed frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Clean frame.
    Data(u8),
    /// The stop bit was observed at space; the garbled byte is kept.
    FramingError(u8),
    /// Framing error with every data bit at space: the line was held low
    /// for at least a full frame.
    Break,
}
impl Frame {
    /// Payload bits, zero for a break.
    pub fn value(&self) -> u8 {
        match self {
            Self::Data(x) | Self::FramingError(x) => *x,
            Self::Break => 0,
        }
    }
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Data(_))
    }
}

/// Opt-in anomaly detection.
///
/// Both checks default to off, which reproduces the unchecked line
/// behavior: glitches become garbage frames and bad stop bits go
/// unreported. Turning a check on never alters when frames complete or
/// what [`Receiver::data`] holds.
#[derive(Debug, Default, Copy, Clone)]
pub struct Checks {
    /// Re-sample the line at the presumed start-bit center; a mark reading
    /// there means the falling edge was a glitch and the frame is
    /// abandoned.
    pub verify_start: bool,
    /// Inspect the stop bit; a space reading latches a framing error, or a
    /// break when the data bits are all space too.
    pub check_stop: bool,
}

/// Receiver phase within a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RxState {
    /// Watching for a falling edge.
    Idle,
    /// Counting to the start-bit center.
    Start,
    /// Sampling data bits.
    Data,
    /// Sampling the stop bit.
    Stop,
}

/// Serial receiver.
pub struct Receiver {
    checks: Checks,
    state: RxState,
    /// Position within the current bit, in oversampling ticks.
    subtick: u8,
    /// Which data bit is sampled next.
    bit_index: u8,
    /// Shift register assembling the frame in flight.
    shift: u8,
    /// Last completed byte.
    data: u8,
    /// Single-step completion pulse.
    done: bool,
    /// Completed frames not yet read.
    fifo: CircularBuffer<FIFO_DEPTH, Frame>,
    lsr: InMemoryRegister<u8, LineStatus::Register>,
}

impl Receiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a receiver with detection enabled per `checks`.
    pub fn with_checks(checks: Checks) -> Self {
        Self { checks, ..Self::default() }
    }

    /// Last assembled byte. Valid from the step [`done`](Self::done) pulses
    /// until the next frame completes.
    pub fn data(&self) -> u8 {
        self.data
    }

    /// True for exactly the one step on which a frame completed. Consumers
    /// must sample it on that step or miss the event.
    pub fn done(&self) -> bool {
        self.done
    }

    /// Current phase.
    pub fn state(&self) -> RxState {
        self.state
    }

    /// A completed frame is waiting in the receive queue.
    pub fn data_ready(&self) -> bool {
        !self.fifo.is_empty()
    }

    pub fn has_overrun(&self) -> bool {
        self.lsr.is_set(LineStatus::OE)
    }
    pub fn has_framing_error(&self) -> bool {
        self.lsr.is_set(LineStatus::FE)
    }
    pub fn has_break(&self) -> bool {
        self.lsr.is_set(LineStatus::BI)
    }
    pub fn has_glitch(&self) -> bool {
        self.lsr.is_set(LineStatus::GR)
    }

    /// Pops the oldest completed frame from the receive queue.
    pub fn read(&mut self) -> Option<Frame> {
        let frame = self.fifo.pop_front();
        self.lsr.modify(LineStatus::DR.val((!self.fifo.is_empty()).into()));
        frame
    }

    /// Line-status byte, see [`LineStatus`] for the bit assignment. The
    /// error bits latch high and clear on read.
    pub fn line_status(&mut self) -> u8 {
        let value = self.lsr.get();
        self.lsr.modify(LineStatus::OE::NoOverrunError); // LH
        self.lsr.modify(LineStatus::FE::NoFrameError); // LH
        self.lsr.modify(LineStatus::BI::NoBreakInterrupt); // LH
        self.lsr.modify(LineStatus::GR::NoGlitch); // LH
        value
    }

    /// Advances one driving-clock step.
    ///
    /// `tick` is the oversampling pulse, `line` the serial input level as
    /// driven at the end of the previous step. `reset` forces idle and
    /// discards the partial frame, the receive queue and the status bits.
    pub fn step(&mut self, tick: bool, line: bool, reset: bool) {
        self.done = false;
        if reset {
            self.state = RxState::Idle;
            self.subtick = 0;
            self.bit_index = 0;
            self.shift = 0;
            self.fifo.clear();
            self.lsr.set(0);
            return;
        }
        match self.state {
            RxState::Idle => {
                // Falling-edge detector: checked every step, not only on
                // ticks. This is what re-synchronizes the receiver to the
                // sender.
                if !line {
                    self.state = RxState::Start;
                    self.subtick = 0;
                }
            }
            RxState::Start if tick => {
                if self.subtick == OVERSAMPLE / 2 - 1 {
                    // presumed temporal center of the start bit
                    if self.checks.verify_start && line {
                        debug!("rx: start edge did not survive to the bit center, rejected");
                        self.lsr.modify(LineStatus::GR::GlitchRejected);
                        self.state = RxState::Idle;
                    } else {
                        self.state = RxState::Data;
                        self.subtick = 0;
                        self.bit_index = 0;
                        self.shift = 0;
                    }
                } else {
                    self.subtick += 1;
                }
            }
            RxState::Data if tick => {
                if self.subtick == OVERSAMPLE - 1 {
                    self.subtick = 0;
                    // the sample lands in the high bit of a right shift, so
                    // the first bit sent ends up in bit 0 (LSB first)
                    self.shift >>= 1;
                    if line {
                        self.shift |= 1 << (DATA_BITS - 1);
                    }
                    if self.bit_index == DATA_BITS - 1 {
                        self.state = RxState::Stop;
                    } else {
                        self.bit_index += 1;
                    }
                } else {
                    self.subtick += 1;
                }
            }
            RxState::Stop if tick => {
                if self.subtick == OVERSAMPLE - 1 {
                    self.publish(line);
                    self.state = RxState::Idle;
                    self.subtick = 0;
                } else {
                    self.subtick += 1;
                }
            }
            _ => {}
        }
    }

    /// Completes the frame in flight: raw outputs first, then the queue
    /// and status bits.
    fn publish(&mut self, stop_bit: bool) {
        trace!("rx: frame done, byte 0x{:02x}", self.shift);
        self.data = self.shift;
        self.done = true;

        let frame = if self.checks.check_stop && !stop_bit {
            if self.shift == 0 {
                debug!("rx: break condition");
                self.lsr.modify(LineStatus::BI::BreakInterrupt);
                Frame::Break
            } else {
                debug!("rx: stop bit at space, byte 0x{:02x} garbled", self.shift);
                self.lsr.modify(LineStatus::FE::FrameError);
                Frame::FramingError(self.shift)
            }
        } else {
            Frame::Data(self.shift)
        };
        if self.fifo.len() < self.fifo.capacity() {
            self.fifo.push_back(frame);
        } else {
            debug!("rx: receive queue full, frame dropped");
            self.lsr.modify(LineStatus::OE::OverrunError);
        }
        self.lsr.modify(LineStatus::DR.val((!self.fifo.is_empty()).into()));
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self {
            checks: Checks::default(),
            state: RxState::Idle,
            subtick: 0,
            bit_index: 0,
            shift: 0,
            data: 0,
            done: false,
            fifo: CircularBuffer::new(),
            lsr: InMemoryRegister::new(0),
        }
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.debug_struct("Receiver")
            .field("checks", &self.checks)
            .field("state", &self.state)
            .field("subtick", &self.subtick)
            .field("bit_index", &self.bit_index)
            .field("shift", &format_args!("0x{:02x}", self.shift))
            .field("data", &format_args!("0x{:02x}", self.data))
            .field("done", &self.done)
            .field("fifo", &self.fifo)
            .field("lsr", &format_args!("0x{:02x}", self.lsr.get()))
            .finish()
    }
}

register_bitfields![u8,
    /// Receiver line status. The error bits latch high until read.
    pub LineStatus [
        /// Data Ready: a completed frame is waiting in the receive queue
        DR OFFSET(0) NUMBITS(1) [DataReady = 1, NoDataReady = 0],
        /// Overrun Error: a completed frame was dropped, queue full (LH)
        OE OFFSET(1) NUMBITS(1) [OverrunError = 1, NoOverrunError = 0],
        /// Framing Error: stop bit observed at space (LH)
        FE OFFSET(2) NUMBITS(1) [FrameError = 1, NoFrameError = 0],
        /// Break Interrupt: framing error with no data bit at mark (LH)
        BI OFFSET(3) NUMBITS(1) [BreakInterrupt = 1, NoBreakInterrupt = 0],
        /// Glitch Rejected: start edge gone by the bit center (LH)
        GR OFFSET(4) NUMBITS(1) [GlitchRejected = 1, NoGlitch = 0],
    ],
];

#[cfg(test)]
mod test {
    use super::*;

    /// 8N1 frame as line levels, LSB first.
    fn frame_bits(byte: u8) -> Vec<bool> {
        let mut bits = vec![false]; // start
        for i in 0..8 {
            bits.push(byte & (1 << i) != 0);
        }
        bits.push(true); // stop
        bits
    }

    /// Holds each bit for 16 oversampling ticks.
    fn oversampled(bits: &[bool]) -> Vec<bool> {
        bits.iter().flat_map(|&bit| std::iter::repeat(bit).take(16)).collect()
    }

    /// Drives the receiver with a tick on every step, collecting completed
    /// bytes from the raw outputs.
    fn drive(rx: &mut Receiver, levels: &[bool]) -> Vec<u8> {
        let mut out = Vec::new();
        for &level in levels {
            rx.step(true, level, false);
            if rx.done() {
                out.push(rx.data());
            }
        }
        out
    }

    fn mark(n: usize) -> Vec<bool> {
        vec![true; n]
    }

    #[test]
    fn decodes_a_frame() {
        for byte in [0x00, 0x55, 0x77, 0xaa, 0xff] {
            let mut rx = Receiver::new();
            let mut wave = mark(5);
            wave.extend(oversampled(&frame_bits(byte)));
            assert_eq!(drive(&mut rx, &wave), vec![byte]);
            assert_eq!(rx.read(), Some(Frame::Data(byte)));
            assert_eq!(rx.state(), RxState::Idle);
        }
    }

    #[test]
    fn done_pulses_for_exactly_one_step() {
        let mut rx = Receiver::new();
        let mut wave = oversampled(&frame_bits(0x42));
        wave.extend(mark(50));
        let mut pulses = 0;
        for &level in &wave {
            rx.step(true, level, false);
            if rx.done() {
                pulses += 1;
            }
        }
        assert_eq!(pulses, 1);
        // the pulse does not survive into the next step
        rx.step(true, true, false);
        assert!(!rx.done());
    }

    #[test]
    fn fsm_only_moves_on_ticks() {
        let mut rx = Receiver::new();
        // the edge detector is asynchronous: no tick needed to leave Idle
        rx.step(false, false, false);
        assert_eq!(rx.state(), RxState::Start);
        // but the start-bit countdown needs ticks
        for _ in 0..100 {
            rx.step(false, false, false);
        }
        assert_eq!(rx.state(), RxState::Start);
    }

    #[test]
    fn unchecked_glitch_becomes_a_garbage_frame() {
        // a one-sample space on an idle line, then mark forever: the
        // unchecked decoder produces all-mark garbage with no signal that
        // anything went wrong
        let mut rx = Receiver::new();
        let mut wave = vec![false];
        wave.extend(mark(200));
        assert_eq!(drive(&mut rx, &wave), vec![0xff]);
        assert!(!rx.has_glitch());
        assert_eq!(rx.read(), Some(Frame::Data(0xff)));
    }

    #[test]
    fn verify_start_rejects_the_glitch() {
        let mut rx = Receiver::with_checks(Checks { verify_start: true, ..Checks::default() });
        let mut wave = vec![false];
        wave.extend(mark(200));
        assert_eq!(drive(&mut rx, &wave), vec![]);
        assert!(rx.has_glitch());
        assert_eq!(rx.state(), RxState::Idle);
        assert_eq!(rx.read(), None);

        // a genuine frame right after still decodes
        let wave = oversampled(&frame_bits(0x9c));
        assert_eq!(drive(&mut rx, &wave), vec![0x9c]);
    }

    #[test]
    fn unchecked_stop_bit_is_never_inspected() {
        let mut rx = Receiver::new();
        let mut bits = frame_bits(0x5a);
        *bits.last_mut().unwrap() = false; // stop bit at space
        let mut wave = oversampled(&bits);
        wave.extend(mark(50));
        assert_eq!(drive(&mut rx, &wave), vec![0x5a]);
        assert!(!rx.has_framing_error());
        assert_eq!(rx.read(), Some(Frame::Data(0x5a)));
    }

    #[test]
    fn check_stop_latches_a_framing_error() {
        let mut rx = Receiver::with_checks(Checks { check_stop: true, ..Checks::default() });
        let mut bits = frame_bits(0x5a);
        *bits.last_mut().unwrap() = false;
        let mut wave = oversampled(&bits);
        wave.extend(mark(50));
        // the raw outputs still publish on time
        assert_eq!(drive(&mut rx, &wave), vec![0x5a]);
        assert!(rx.has_framing_error());
        assert!(!rx.has_break());
        assert_eq!(rx.read(), Some(Frame::FramingError(0x5a)));
    }

    #[test]
    fn held_low_line_is_a_break() {
        let mut rx = Receiver::with_checks(Checks { check_stop: true, ..Checks::default() });
        let mut wave = vec![false; 16 * 10]; // a full frame of space
        wave.extend(mark(50));
        assert_eq!(drive(&mut rx, &wave), vec![0x00]);
        assert!(rx.has_break());
        assert!(!rx.has_framing_error());
        let frame = rx.read().unwrap();
        assert_eq!(frame, Frame::Break);
        assert!(frame.is_error());
        assert_eq!(frame.value(), 0);
    }

    #[test]
    fn seventeenth_unread_frame_overruns() {
        let mut rx = Receiver::new();
        let mut wave = Vec::new();
        for byte in 0..17 {
            wave.extend(oversampled(&frame_bits(byte)));
            wave.extend(mark(4));
        }
        let bytes = drive(&mut rx, &wave);
        // the raw outputs see all 17, the queue keeps the first 16
        assert_eq!(bytes.len(), 17);
        assert!(rx.has_overrun());
        for byte in 0..16 {
            assert_eq!(rx.read(), Some(Frame::Data(byte)));
        }
        assert_eq!(rx.read(), None);
        assert!(!rx.data_ready());
    }

    #[test]
    fn line_status_error_bits_clear_on_read() {
        let mut rx = Receiver::with_checks(Checks { check_stop: true, ..Checks::default() });
        let mut bits = frame_bits(0x81);
        *bits.last_mut().unwrap() = false;
        drive(&mut rx, &oversampled(&bits));

        let first = rx.line_status();
        assert_ne!(first & 0b0000_0100, 0); // FE
        assert_ne!(first & 0b0000_0001, 0); // DR
        assert!(!rx.has_framing_error());
        let second = rx.line_status();
        assert_eq!(second & 0b0000_0100, 0);
        assert_ne!(second & 0b0000_0001, 0); // DR is a level, not a latch
    }

    #[test]
    fn reset_discards_the_partial_frame() {
        let mut rx = Receiver::new();
        let wave = oversampled(&frame_bits(0x77));
        // stop 40 ticks in, mid data bits
        for &level in &wave[..40] {
            rx.step(true, level, false);
        }
        rx.step(false, true, true);
        assert_eq!(rx.state(), RxState::Idle);
        assert!(!rx.done());
        assert!(!rx.data_ready());
        // nothing completes afterwards on an idle line
        assert_eq!(drive(&mut rx, &mark(400)), vec![]);
    }
}
