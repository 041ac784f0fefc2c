// src/pid/level.rs

//! # Desired Rate
//!
//! Computes the rate setpoint of an axis from the stick command and, in self
//! levelling modes, from the angle error.
//!
//! The stick rate is `(rate + 27) * command / 16` on roll and pitch and
//! `/ 32` on yaw. The angle loop turns an inclination error in decidegrees
//! into a rate with the level P gain alone. A level percent of 100 replaces the
//! stick rate, anything between 1 and 99 adds the weighted angle rate on top
//! of it. Yaw never self levels.

use crate::axis::Axis;
use crate::Number;

/// Full self levelling.
pub const LEVEL_FULL: u8 = 100;

/// Angle loop contribution of one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelDemand {
    /// Blend percent, 0 disables the angle loop.
    pub percent: u8,
    /// Inclination error in decidegrees.
    pub error_dd: i32,
    /// Level P gain.
    pub p: u8,
}

/// Inclination error: commanded angle clamped to the inclination limit,
/// minus the measured angle, plus trim.
pub fn angle_error(command: i16, attitude_dd: i16, trim_dd: i16, max_inclination: u16) -> i32 {
    let limit = i32::from(max_inclination);
    (2 * i32::from(command)).clamp(-limit, limit) - i32::from(attitude_dd) + i32::from(trim_dd)
}

/// Rate demanded by the stick alone.
pub fn stick_rate<T: Number>(axis: Axis, rate: u8, command: i16) -> T {
    let divisor = match axis {
        Axis::Yaw => 32,
        _ => 16,
    };
    T::from_i32((i32::from(rate) + 27) * i32::from(command)) / T::from_i32(divisor)
}

/// Rate setpoint of an axis.
pub fn desired_rate<T: Number>(axis: Axis, rate: u8, command: i16, level: LevelDemand) -> T {
    let stick = stick_rate::<T>(axis, rate, command);
    if axis == Axis::Yaw || level.percent == 0 {
        return stick;
    }
    let angle_rate = T::from_i32(level.error_dd * i32::from(level.p)) / T::from_i32(16);
    if level.percent >= LEVEL_FULL {
        angle_rate
    } else {
        stick + angle_rate * T::from_i32(level.percent.into()) / T::from_i32(100)
    }
}

/// Horizon mode blend percent.
///
/// Full levelling with centred sticks, fading out as the larger of the roll
/// and pitch deflections grows. `sensitivity` is the level D gain: 100 keeps
/// the plain linear fade, lower values fade out sooner, 0 disables levelling.
pub fn horizon_strength(roll: i16, pitch: i16, sensitivity: u8) -> u8 {
    if sensitivity == 0 {
        return 0;
    }
    let deflection = i32::from(roll.unsigned_abs().max(pitch.unsigned_abs()).min(500));
    let base = (500 - deflection) / 5;
    let strength = (base - 100) * (100 / i32::from(sensitivity)) + 100;
    strength.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// Test the stick rate on each axis.
    #[test]
    fn test_stick_rate() {
        assert_eq!(200, stick_rate::<i32>(Axis::Roll, 173, 16), "Roll divides by 16.");
        assert_eq!(100, stick_rate::<i32>(Axis::Yaw, 173, 16), "Yaw divides by 32.");
        assert!(
            value_close(12.5, stick_rate::<f32>(Axis::Pitch, 173, 1)),
            "Float keeps the fraction."
        );
    }

    /// Test the inclination clamp and trim.
    #[test]
    fn test_angle_error() {
        assert_eq!(500, angle_error(400, 0, 0, 500), "Command clamps at the limit.");
        assert_eq!(-100, angle_error(0, 120, 20, 500), "Attitude and trim.");
    }

    /// Test full, partial and disabled levelling.
    #[test]
    fn test_desired_rate_blend() {
        let level = LevelDemand {
            percent: 100,
            error_dd: 160,
            p: 20,
        };
        assert_eq!(200, desired_rate::<i32>(Axis::Roll, 0, 0, level), "Angle mode ignores the stick rate.");

        let half = LevelDemand { percent: 50, ..level };
        assert_eq!(
            27 + 100,
            desired_rate::<i32>(Axis::Roll, 0, 16, half),
            "Horizon adds half the angle rate."
        );

        assert_eq!(32, desired_rate::<i32>(Axis::Yaw, 5, 32, level), "Yaw never levels.");
        let off = LevelDemand { percent: 0, ..level };
        assert_eq!(27, desired_rate::<i32>(Axis::Pitch, 0, 16, off), "Rate mode.");
    }

    /// Test the horizon fade.
    #[test]
    fn test_horizon_strength() {
        assert_eq!(100, horizon_strength(0, 0, 100), "Centred sticks level fully.");
        assert_eq!(50, horizon_strength(250, -100, 100), "Half stick levels half.");
        assert_eq!(0, horizon_strength(0, -500, 100), "Full stick does not level.");
        assert_eq!(0, horizon_strength(250, 0, 50), "Low sensitivity fades sooner.");
        assert_eq!(0, horizon_strength(0, 0, 0), "Zero sensitivity disables levelling.");
    }
}
