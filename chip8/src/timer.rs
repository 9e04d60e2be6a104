//! Delay and sound timers.
use std::time::Duration;

use crate::constants::*;

/// Time a single timer period takes.
pub const TIMER_PERIOD: Duration = Duration::from_nanos(CLOCK_CYCLE_TIME);

/// The two 60 Hz countdown timers.
///
/// Timers count wall time, not instructions. Elapsed time is
/// collected in an accumulator, and every whole period in it
/// counts both timers down once. The remainder carries over
/// to the next call, so no time is lost between cycles.
#[derive(Debug, Default, Clone)]
pub struct Timers {
    /// (DT) Delay timer that counts down to 0.
    pub delay: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub sound: u8,
    accumulator: Duration,
}

impl Timers {
    pub fn new() -> Self {
        Default::default()
    }

    /// Feed elapsed wall time into the timers.
    ///
    /// Returns the number of whole periods that passed.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator = self.accumulator.saturating_add(elapsed);

        let period = TIMER_PERIOD.as_nanos();
        let accumulated = self.accumulator.as_nanos();
        let whole = accumulated / period;
        self.accumulator = Duration::from_nanos((accumulated % period) as u64);

        let ticks = u32::try_from(whole).unwrap_or(u32::MAX);

        if ticks > 0 {
            // Timers stop at zero instead of wrapping around.
            let count = ticks.min(u8::MAX as u32) as u8;
            self.delay = self.delay.saturating_sub(count);
            self.sound = self.sound.saturating_sub(count);
        }

        ticks
    }

    /// Buzzer should be on while the sound timer counts down.
    #[inline(always)]
    pub fn is_sounding(&self) -> bool {
        self.sound > 0
    }

    /// Stop both timers and drop any partially elapsed period.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timer_period() {
        assert_eq!(TIMER_PERIOD.as_micros(), 16_666);
    }

    #[test]
    fn test_one_second_counts_sixty() {
        // Any instruction throughput: the second is cut into very different slices.
        for slices in [1_u32, 7, 60, 500, 1000, 3333] {
            let mut timers = Timers::new();
            timers.delay = 200;
            timers.sound = 200;

            let slice = Duration::from_secs(1) / slices;
            let mut ticks = 0;
            for _ in 0..slices {
                ticks += timers.advance(slice);
            }

            assert!((59..=61).contains(&ticks), "{slices} slices gave {ticks} ticks");
            assert_eq!(timers.delay, 200 - ticks as u8);
            assert_eq!(timers.sound, 200 - ticks as u8);
        }
    }

    #[test]
    fn test_timers_clamp_at_zero() {
        let mut timers = Timers::new();
        timers.delay = 3;
        timers.sound = 1;

        timers.advance(Duration::from_secs(1));

        assert_eq!(timers.delay, 0);
        assert_eq!(timers.sound, 0);
        assert!(!timers.is_sounding());

        timers.advance(TIMER_PERIOD);
        assert_eq!(timers.delay, 0);
    }

    #[test]
    fn test_partial_period_carries_over() {
        let mut timers = Timers::new();
        timers.delay = 10;

        assert_eq!(timers.advance(TIMER_PERIOD / 2), 0);
        assert_eq!(timers.delay, 10);
        assert_eq!(timers.advance(TIMER_PERIOD / 2), 1);
        assert_eq!(timers.delay, 9);
    }

    #[test]
    fn test_huge_elapsed_time() {
        let mut timers = Timers::new();
        timers.delay = 255;
        timers.advance(TIMER_PERIOD / 3);

        let ticks = timers.advance(Duration::from_secs(150_000_000));

        assert_eq!(ticks, u32::MAX);
        assert_eq!(timers.delay, 0);

        // The remainder is still smaller than one period.
        assert_eq!(timers.advance(Duration::ZERO), 0);
        assert!(timers.accumulator < TIMER_PERIOD);
    }

    #[test]
    fn test_no_time_no_tick() {
        let mut timers = Timers::new();
        timers.delay = 10;

        for _ in 0..10_000 {
            timers.advance(Duration::ZERO);
        }

        assert_eq!(timers.delay, 10);
    }
}
