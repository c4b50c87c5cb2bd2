//! Serial transmitter.
//!
//! Serializes bytes onto the line: start bit (space), 8 data bits LSB
//! first, stop bit (mark), each held for 16 oversampling ticks. Bytes
//! submitted while a frame is on the line wait in a 16-deep holding queue.

use crate::uart::{DATA_BITS, FIFO_DEPTH, OVERSAMPLE};
use circular_buffer::CircularBuffer;
use log::*;
use thiserror::Error;

/// The holding queue is full; the byte was not accepted.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("transmit holding queue is full, byte 0x{byte:02x} rejected")]
pub struct QueueFull {
    /// The rejected payload.
    pub byte: u8,
}

/// Transmitter phase within a frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TxState {
    /// Line at mark, ready for a byte.
    Idle,
    /// Driving the start bit.
    Start,
    /// Driving data bits, LSB first.
    Data,
    /// Driving the stop bit.
    Stop,
}

/// Serial transmitter.
#[derive(Debug)]
pub struct Transmitter {
    state: TxState,
    /// Position within the current bit, in oversampling ticks.
    subtick: u8,
    /// Which data bit is on the line.
    bit_index: u8,
    /// Byte latched for the frame in progress.
    buffer: u8,
    /// Bytes waiting for the line.
    fifo: CircularBuffer<FIFO_DEPTH, u8>,
}

impl Transmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current line level. The level is a pure function of the phase, the
    /// bit index and the latched byte; mark while idle.
    pub fn pin(&self) -> bool {
        match self.state {
            TxState::Idle | TxState::Stop => true,
            TxState::Start => false,
            TxState::Data => self.buffer & (1 << self.bit_index) != 0,
        }
    }

    /// True while a frame is on the line.
    pub fn busy(&self) -> bool {
        self.state != TxState::Idle
    }

    /// Current phase.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Bytes waiting in the holding queue.
    pub fn queued(&self) -> usize {
        self.fifo.len()
    }

    /// Submits a byte for transmission.
    ///
    /// When the line is idle and nothing is queued, the frame starts on
    /// this call and the line falls to the start bit. Otherwise the byte
    /// waits in the holding queue and goes out once the frames ahead of it
    /// have finished. A full queue rejects the byte.
    pub fn send(&mut self, byte: u8) -> Result<(), QueueFull> {
        if self.state == TxState::Idle && self.fifo.is_empty() {
            self.load(byte);
            Ok(())
        } else if self.fifo.len() < self.fifo.capacity() {
            self.fifo.push_back(byte);
            Ok(())
        } else {
            Err(QueueFull { byte })
        }
    }

    fn load(&mut self, byte: u8) {
        trace!("tx: frame start, byte 0x{:02x}", byte);
        self.buffer = byte;
        self.state = TxState::Start;
        self.subtick = 0;
        self.bit_index = 0;
    }

    /// Advances one driving-clock step.
    ///
    /// `tick` is the oversampling pulse from the baud generator; the frame
    /// only progresses on tick steps. `reset` forces idle, drops the frame
    /// in progress and empties the holding queue; the partial bits already
    /// sent are lost.
    pub fn step(&mut self, tick: bool, reset: bool) {
        if reset {
            if self.state != TxState::Idle || !self.fifo.is_empty() {
                trace!("tx: reset, frame and queue dropped");
            }
            self.state = TxState::Idle;
            self.subtick = 0;
            self.bit_index = 0;
            self.fifo.clear();
            return;
        }
        match self.state {
            TxState::Idle => {
                // a queued byte may start a frame between ticks
                if let Some(byte) = self.fifo.pop_front() {
                    self.load(byte);
                }
            }
            TxState::Start if tick => {
                if self.subtick == OVERSAMPLE - 1 {
                    self.subtick = 0;
                    self.bit_index = 0;
                    self.state = TxState::Data;
                } else {
                    self.subtick += 1;
                }
            }
            TxState::Data if tick => {
                if self.subtick == OVERSAMPLE - 1 {
                    self.subtick = 0;
                    if self.bit_index == DATA_BITS - 1 {
                        self.state = TxState::Stop;
                    } else {
                        self.bit_index += 1;
                    }
                } else {
                    self.subtick += 1;
                }
            }
            TxState::Stop if tick => {
                if self.subtick == OVERSAMPLE - 1 {
                    self.subtick = 0;
                    self.state = TxState::Idle;
                } else {
                    self.subtick += 1;
                }
            }
            _ => {}
        }
    }
}

impl Default for Transmitter {
    fn default() -> Self {
        Self { state: TxState::Idle, subtick: 0, bit_index: 0, buffer: 0, fifo: CircularBuffer::new() }
    }
}
