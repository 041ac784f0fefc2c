// src/rc/smoothing.rs

//! Interpolation of stick commands between receiver frames.
//!
//! A receiver frame arrives every `refresh_interval_us`, while the control
//! loop runs every few milliseconds. Instead of holding a command flat until
//! the next frame, each new command is approached over the loop iterations
//! that fit in one refresh interval.

/// Number of smoothed channels: roll, pitch, yaw and throttle.
pub const SMOOTHED_CHANNELS: usize = 4;

/// Stepwise interpolation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RcSmoother {
    last: [i32; SMOOTHED_CHANNELS],
    delta: [i32; SMOOTHED_CHANNELS],
    factor: i32,
}

impl RcSmoother {
    /// Creates a smoother with no history.
    pub const fn new() -> Self {
        Self {
            last: [0; SMOOTHED_CHANNELS],
            delta: [0; SMOOTHED_CHANNELS],
            factor: 0,
        }
    }

    /// Smooths `command` in place.
    ///
    /// `fresh` marks a loop iteration that follows a new receiver frame.
    /// `refresh_us` is the expected frame interval and `dt_us` the loop period.
    pub fn apply(&mut self, command: &mut [i32; SMOOTHED_CHANNELS], fresh: bool, refresh_us: u32, dt_us: u32) {
        let interpolation = (refresh_us / dt_us.max(1)).max(1) as i32;

        if fresh {
            for (channel, value) in command.iter_mut().enumerate() {
                let shown = self.last[channel] - self.delta[channel] * self.factor / interpolation;
                self.delta[channel] = *value - shown;
                self.last[channel] = *value;
            }
            self.factor = interpolation - 1;
        } else {
            self.factor -= 1;
        }

        if self.factor > 0 {
            for (channel, value) in command.iter_mut().enumerate() {
                *value = self.last[channel] - self.delta[channel] * self.factor / interpolation;
            }
        } else {
            self.factor = 0;
        }
    }

    /// Forgets the history, so the next frame is taken as is.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
