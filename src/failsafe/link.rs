// src/failsafe/link.rs

//! Receiver link health.
//!
//! The link goes down once invalid frames have persisted for the failure
//! window since the last valid frame, and comes back up once valid frames
//! have been flowing for the recovery window since the last invalid one.

use crate::clock::{elapsed, MICROS_PER_MILLI};

/// Base window of invalid data before the link is declared down.
pub const RXDATA_FAILURE_US: u32 = 200 * MICROS_PER_MILLI;
/// Window of valid data before the link is declared up again.
pub const RXDATA_RECOVERY_US: u32 = 200 * MICROS_PER_MILLI;
/// Unit of the configured failsafe delay.
pub const TENTH_SECOND_US: u32 = 100 * MICROS_PER_MILLI;

/// Tracks when valid and invalid receiver data was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMonitor {
    failure_window_us: u32,
    valid_at: u32,
    failed_at: u32,
    up: bool,
    suspended: bool,
}

impl LinkMonitor {
    /// Creates a monitor with the link down. `delay` extends the failure
    /// window in tenths of a second.
    pub fn new(delay: u8) -> Self {
        Self {
            failure_window_us: RXDATA_FAILURE_US + u32::from(delay) * TENTH_SECOND_US,
            valid_at: 0,
            failed_at: 0,
            up: false,
            suspended: false,
        }
    }

    /// Records a valid frame.
    pub fn on_valid(&mut self, now: u32) {
        self.valid_at = now;
        if !self.up && elapsed(now, self.failed_at) > RXDATA_RECOVERY_US {
            self.up = true;
            log_info!("link: up");
        }
    }

    /// Records an invalid or missing frame.
    pub fn on_invalid(&mut self, now: u32) {
        self.failed_at = now;
        if self.up && elapsed(now, self.valid_at) > self.failure_window_us {
            self.up = false;
            log_warn!("link: down");
        }
    }

    /// Whether the link is up. Always true while suspended.
    pub fn is_up(&self) -> bool {
        self.up || self.suspended
    }

    /// Stops link tracking, for receiver reconfiguration.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Restarts tracking with the link up.
    pub fn resume(&mut self, now: u32) {
        self.suspended = false;
        self.valid_at = now;
        self.up = true;
    }

    /// Failure window in microseconds.
    pub fn failure_window_us(&self) -> u32 {
        self.failure_window_us
    }
}
