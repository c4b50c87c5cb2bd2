//! Bit-level model of an asynchronous serial (UART) link.
//!
//! One driving-clock step at a time: a baud generator derives the 16x
//! oversampling tick, a transmitter serializes bytes onto the line, and an
//! independent receiver re-synchronizes on falling edges and samples each
//! bit near its center. Fixed [8N1](https://en.wikipedia.org/wiki/8-N-1)
//! framing.

pub mod uart;
pub mod utils;
