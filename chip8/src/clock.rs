//! CPU Clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::*;

/// CPU clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize thread with the software clock of the virtual CPU.
///
/// It is designed to work with the yielding cooperative pattern
/// of the interpreter loop. When the VM yields control back to the
/// caller, time elapses until it is resumed. Once the interpreter
/// is resumed, the elapsed time is taken into account when determining
/// the next cycle.
pub(crate) struct Clock {
    last: Instant,
    interval: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            last: Instant::now(),
            interval,
        }
    }

    /// Set the clock state back to zero.
    pub(crate) fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Time elapsed since the previous lap, restarting the measurement.
    pub(crate) fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed
    }

    /// Block the current thread until the next clock cycle.
    ///
    /// A zero interval never blocks.
    pub(crate) fn wait(&mut self) {
        if self.interval.is_zero() {
            return;
        }

        while self.last.elapsed() < self.interval {
            // Sleep does not have enough resolution, and causes
            // the clock to run at 30 FPS.
            //
            // Spinning a loop causes high CPU usage and fan madness.
            //
            // Yielding in a loop is the best alternative.
            thread::yield_now();
        }

        // Reset back to zero, rather than trying to catch up.
        //
        // If the VM was paused, and a large amount of time has elapsed
        // until it is resumed, it should simply continue at the next
        // cycle running at its usual speed.
        self.reset();
    }
}
