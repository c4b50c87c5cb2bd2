//! Baud-rate generator.
//!
//! Divides the driving clock by a fixed divisor to produce a single-step
//! pulse, 16 of which span one bit period. The effective line rate is
//! `clock / (divisor * 16)`, see [`crate::utils::bit_rate`].

/// Divide-by-N tick generator.
///
/// Emits one tick pulse every `divisor` driving-clock steps. Both ends of
/// the link consume ticks from a generator with the same divisor; in a
/// loopback they can share a single one.
#[derive(Debug, Clone)]
pub struct BaudGen {
    divisor: u32,
    counter: u32,
}

impl BaudGen {
    /// Creates a generator with the given divisor.
    ///
    /// # Panics
    /// Panics if `divisor` is zero.
    pub fn new(divisor: u32) -> Self {
        assert!(divisor >= 1, "baud divisor must be at least 1");
        Self { divisor, counter: 0 }
    }

    /// Configured divisor.
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Advances one driving-clock step.
    ///
    /// Returns true on the steps where the oversampling tick fires, exactly
    /// once every `divisor` steps. `reset` restarts the count and
    /// suppresses the tick for that step.
    pub fn step(&mut self, reset: bool) -> bool {
        if reset {
            self.counter = 0;
            false
        } else if self.counter == self.divisor - 1 {
            self.counter = 0;
            true
        } else {
            self.counter += 1;
            false
        }
    }
}
