// src/clock.rs

//! # Monotonic Clock
//!
//! The core reads time as a `u32` microsecond counter, which wraps every
//! 2^32 us, about 71.6 minutes. All timing stays wrap-safe: durations use
//! wrapping subtraction in [`elapsed`] and deadlines are compared through
//! [`reached`], which is exact while the two instants are less than 2^31 us
//! (about 35.8 minutes) apart. A wrap never stalls a timer.

use core::cell::Cell;

/// Microseconds in one millisecond.
pub const MICROS_PER_MILLI: u32 = 1_000;

/// Microseconds in one second.
pub const MICROS_PER_SECOND: u32 = 1_000_000;

/// Period of the microsecond counter, 2^32 us.
pub const WRAP_PERIOD_US: u64 = 1 << 32;

/// Source of monotonic microsecond time.
pub trait Clock {
    /// Current time in microseconds. Wraps around on overflow.
    fn now_us(&self) -> u32;
}

/// Microseconds elapsed from `since` to `now`, tolerant of counter wrap.
#[inline]
pub const fn elapsed(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// Whether `deadline` has been reached at time `now`.
///
/// Valid as long as the two instants are less than 2^31 us apart.
#[inline]
pub const fn reached(now: u32, deadline: u32) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Deadline `delay_us` after `now`.
#[inline]
pub const fn deadline_after(now: u32, delay_us: u32) -> u32 {
    now.wrapping_add(delay_us)
}

/// Clock driven by hand, for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Cell<u32>,
}

impl MockClock {
    /// Creates a clock reading `start_us`.
    pub fn new(start_us: u32) -> Self {
        Self {
            now: Cell::new(start_us),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, now_us: u32) {
        self.now.set(now_us);
    }

    /// Moves time forward, wrapping on overflow.
    pub fn advance(&self, delta_us: u32) {
        self.now.set(self.now.get().wrapping_add(delta_us));
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u32 {
        self.now.get()
    }
}
