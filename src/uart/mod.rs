//! Asynchronous serial link modeled at the bit-timing level.
//!
//! Fixed 8N1 framing: one start bit (space), 8 data bits LSB first, one
//! stop bit (mark). Sender and receiver share no phase reference; the
//! receiver locates bit centers by 16x oversampling.
//!
//! # [UART](https://en.wikipedia.org/wiki/Universal_asynchronous_receiver-transmitter):
//! * [baud generator](crate::uart::baud)
//! * [transmitter](crate::uart::tx)
//! * [receiver](crate::uart::rx)
//!
//! # References
//! * https://www.circuitbasics.com/basics-uart-communication/

pub mod baud;
pub mod rx;
pub mod tx;

/// Oversampling ticks per bit period.
pub const OVERSAMPLE: u8 = 16;
/// Data bits per frame.
pub const DATA_BITS: u8 = 8;
/// Bits on the wire per frame: start + data + stop.
pub const FRAME_BITS: u8 = 1 + DATA_BITS + 1;
/// Depth of the transmit holding and receive queues.
pub const FIFO_DEPTH: usize = 16;
