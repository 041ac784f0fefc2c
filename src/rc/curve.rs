// src/rc/curve.rs

//! # Stick Curves
//!
//! Expo and rate are baked into small lookup tables sampled every 100 units
//! of stick travel. A stick value is mapped by linear interpolation between
//! the two neighbouring breakpoints, which keeps the curve continuous at every
//! multiple of 100.

use crate::axis::Axis;
use crate::config::RateProfile;

/// Breakpoints of the roll/pitch curve.
pub const PITCH_LOOKUP_LENGTH: usize = 7;
/// Breakpoints of the yaw curve.
pub const YAW_LOOKUP_LENGTH: usize = 7;
/// Breakpoints of the throttle curve.
pub const THROTTLE_LOOKUP_LENGTH: usize = 12;

/// Largest stick deflection from centre.
pub const MAX_DEFLECTION: i32 = 500;
/// Largest throttle command.
pub const MAX_THROTTLE: i32 = 1000;

/// Lookup tables built from a [`RateProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcCurves {
    roll_pitch: [i16; PITCH_LOOKUP_LENGTH],
    yaw: [i16; YAW_LOOKUP_LENGTH],
    throttle: [i16; THROTTLE_LOOKUP_LENGTH],
}

impl RcCurves {
    /// Builds the tables for a rate profile.
    pub fn new(profile: &RateProfile) -> Self {
        let rc_rate = i32::from(profile.rc_rate);
        let rc_expo = i32::from(profile.rc_expo);
        let yaw_expo = i32::from(profile.rc_yaw_expo);
        let thr_mid = i32::from(profile.thr_mid);
        let thr_expo = i32::from(profile.thr_expo);

        let mut roll_pitch = [0; PITCH_LOOKUP_LENGTH];
        for (i, entry) in roll_pitch.iter_mut().enumerate() {
            let i = i as i32;
            *entry = ((2500 + rc_expo * (i * i - 25)) * i * rc_rate / 2500) as i16;
        }

        let mut yaw = [0; YAW_LOOKUP_LENGTH];
        for (i, entry) in yaw.iter_mut().enumerate() {
            let i = i as i32;
            *entry = ((2500 + yaw_expo * (i * i - 25)) * i / 25) as i16;
        }

        let mut throttle = [0; THROTTLE_LOOKUP_LENGTH];
        for (i, entry) in throttle.iter_mut().enumerate() {
            let tmp = 10 * i as i32 - thr_mid;
            let y = if tmp > 0 {
                100 - thr_mid
            } else if tmp < 0 {
                thr_mid
            } else {
                1
            }
            .max(1);
            *entry = (10 * thr_mid + tmp * (100 - thr_expo + thr_expo * (tmp * tmp) / (y * y)) / 10) as i16;
        }

        Self {
            roll_pitch,
            yaw,
            throttle,
        }
    }

    /// Maps a stick deflection magnitude (0..=500) through the axis curve.
    pub fn lookup_stick(&self, axis: Axis, deflection: i32) -> i32 {
        let deflection = deflection.clamp(0, MAX_DEFLECTION);
        match axis {
            Axis::Roll | Axis::Pitch => interpolate(&self.roll_pitch, deflection),
            Axis::Yaw => interpolate(&self.yaw, deflection),
        }
    }

    /// Maps a linear throttle (0..=1000) through the throttle curve.
    pub fn lookup_throttle(&self, throttle: i32) -> i32 {
        interpolate(&self.throttle, throttle.clamp(0, MAX_THROTTLE))
    }
}

/// Linear interpolation between breakpoints spaced 100 units apart.
pub fn interpolate(table: &[i16], value: i32) -> i32 {
    let last = table.len().saturating_sub(2) as i32;
    let index = (value / 100).clamp(0, last);
    let residual = value - index * 100;
    let low = i32::from(table[index as usize]);
    let high = i32::from(table[index as usize + 1]);
    low + residual * (high - low) / 100
}
