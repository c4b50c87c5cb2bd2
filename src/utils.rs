//! Line-rate arithmetic.
//!
//! The link runs at `clock / (divisor * 16)` bits per second. Keeping the
//! math as exact fractions avoids the rounding traps of floating-point
//! baud values.

use crate::uart::{FRAME_BITS, OVERSAMPLE};
use gcd::Gcd;
use std::time::Duration;
use thiserror::Error;

/// No integer divisor maps the clock to the requested rate.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
#[error("no exact divisor: {clock_hz} Hz / (16 x {baud} baud) leaves a remainder")]
pub struct NoExactDivisor {
    /// The driving-clock frequency.
    pub clock_hz: u32,
    /// The requested line rate.
    pub baud: u32,
}

/// Unsigned number represented by a fraction.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fraction(pub u32, pub u32);
impl Fraction {
    pub fn reduce(self) -> Self {
        let div = self.0.gcd(self.1);
        if div > 1 {
            Fraction(self.0 / div, self.1 / div)
        } else {
            self
        }
    }
    pub fn invert(self) -> Fraction {
        Fraction(self.1, self.0)
    }
}
impl std::ops::Div<u32> for Fraction {
    type Output = Fraction;
    fn div(self, div: u32) -> Fraction {
        #[allow(clippy::suspicious_arithmetic_impl)]
        Fraction(self.0, self.1 * div).reduce()
    }
}
impl From<Fraction> for Duration {
    fn from(x: Fraction) -> Self {
        Duration::from_secs(u64::from(x.0)) / x.1
    }
}

/// Line bit rate for a driving clock and baud divisor, in bits per second.
pub fn bit_rate(clock_hz: u32, divisor: u32) -> Fraction {
    Fraction(clock_hz, divisor * u32::from(OVERSAMPLE)).reduce()
}

/// Wall-clock duration of one 10-bit frame.
pub fn frame_duration(clock_hz: u32, divisor: u32) -> Duration {
    (bit_rate(clock_hz, divisor) / u32::from(FRAME_BITS)).invert().into()
}

/// Divisor that produces exactly `baud` from `clock_hz`.
///
/// Only exact settings are accepted; a remainder means the requested rate
/// is not reachable from this clock.
pub fn divisor_for(clock_hz: u32, baud: u32) -> Result<u32, NoExactDivisor> {
    match baud.checked_mul(u32::from(OVERSAMPLE)) {
        Some(d) if d != 0 && clock_hz % d == 0 && clock_hz / d >= 1 => Ok(clock_hz / d),
        _ => Err(NoExactDivisor { clock_hz, baud }),
    }
}
