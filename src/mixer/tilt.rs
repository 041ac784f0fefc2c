// src/mixer/tilt.rs

//! # Tilt Rotor Compensation
//!
//! On a tilt rotor the motors pitch relative to the frame. As the rotors
//! tilt away from vertical, part of their thrust no longer lifts and a roll
//! command starts to turn the body around its yaw axis instead.
//!
//! The tilt angle is the motor pitch minus the measured body pitch (the body
//! term only with [`COMPENSATE_BODY`]). From it:
//!
//! - thrust is divided by `cos(angle)` with [`COMPENSATE_THRUST`] while the
//!   cosine is positive, keeping vertical thrust constant;
//! - roll and yaw are cross mixed with [`COMPENSATE_TILT`]:
//!   `roll' = roll * cos + yaw * sin` and `yaw' = yaw * cos + roll * sin`,
//!   so at 90 degrees a roll command becomes a yaw command and vice versa.
//!
//! In [`TiltMode::Static`] the commands pass through untouched.

use crate::error::{ConfigError, ConfigResult};
use crate::mixer::MixerInput;
use core::f32::consts::PI;

/// Scale thrust with the tilt angle.
pub const COMPENSATE_THRUST: u8 = 1 << 0;
/// Cross mix roll and yaw with the tilt angle.
pub const COMPENSATE_TILT: u8 = 1 << 1;
/// Include the body pitch in the tilt angle.
pub const COMPENSATE_BODY: u8 = 1 << 2;

/// Throttle span the compensation works in.
pub const TILT_THROTTLE_MAX: i16 = 1000;

/// How the tilt servo is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TiltMode {
    /// Motors are fixed at their mounting angle, no compensation.
    Static,
    /// Motor pitch follows the control channel and is compensated.
    #[default]
    Dynamic,
}

/// Tilt rotor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiltConfig {
    /// Static or dynamic tilt.
    pub mode: TiltMode,
    /// Set of `COMPENSATE_*` flags.
    pub compensation: u8,
    /// Mixer input that commands the motor pitch.
    pub control_channel: MixerInput,
    /// Servo angle at full negative command, degrees.
    pub servo_angle_min: i8,
    /// Servo angle at full positive command, degrees.
    pub servo_angle_max: i8,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            mode: TiltMode::Dynamic,
            compensation: COMPENSATE_THRUST | COMPENSATE_TILT | COMPENSATE_BODY,
            control_channel: MixerInput::RcAux1,
            servo_angle_min: -45,
            servo_angle_max: 45,
        }
    }
}

impl TiltConfig {
    /// Checks the servo angle range.
    pub fn validate(&self) -> ConfigResult<()> {
        let (min, max) = (self.servo_angle_min, self.servo_angle_max);
        if min >= max || min < -90 || max > 90 {
            return Err(ConfigError::TiltRange { min, max });
        }
        Ok(())
    }

    /// Motor pitch in decidegrees for a control value in `-500..=500`.
    ///
    /// Each half of the stick range maps onto its own half of the servo
    /// range, so an asymmetric range keeps centre at zero.
    pub fn motor_pitch_dd(&self, control: i16) -> i16 {
        let control = i32::from(control.clamp(-500, 500));
        let degrees_x10 = if control >= 0 {
            control * i32::from(self.servo_angle_max) * 10 / 500
        } else {
            -control * i32::from(self.servo_angle_min) * 10 / 500
        };
        degrees_x10 as i16
    }

    fn has(&self, flag: u8) -> bool {
        self.compensation & flag != 0
    }
}

/// Commands entering the compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TiltInput {
    /// Throttle in `0..=1000`.
    pub throttle: i16,
    /// Roll demand.
    pub roll: i16,
    /// Pitch demand.
    pub pitch: i16,
    /// Yaw demand.
    pub yaw: i16,
    /// Motor pitch relative to the frame, decidegrees.
    pub motor_pitch_dd: i16,
    /// Measured body pitch, decidegrees.
    pub body_pitch_dd: i16,
}

/// Compensated commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TiltOutput {
    /// Throttle in `0..=1000`.
    pub throttle: i16,
    /// Roll demand.
    pub roll: i16,
    /// Pitch demand.
    pub pitch: i16,
    /// Yaw demand.
    pub yaw: i16,
}

fn decidegrees_to_radians(dd: i16) -> f32 {
    f32::from(dd) * PI / 1800.0
}

/// Applies the configured compensation.
pub fn compensate(config: &TiltConfig, input: &TiltInput) -> TiltOutput {
    let throttle = input.throttle.clamp(0, TILT_THROTTLE_MAX);
    let mut output = TiltOutput {
        throttle,
        roll: input.roll,
        pitch: input.pitch,
        yaw: input.yaw,
    };
    if config.mode == TiltMode::Static {
        return output;
    }

    let mut angle = decidegrees_to_radians(input.motor_pitch_dd);
    if config.has(COMPENSATE_BODY) {
        angle -= decidegrees_to_radians(input.body_pitch_dd);
    }
    let cosine = libm::cosf(angle);
    let sine = libm::sinf(angle);

    if config.has(COMPENSATE_THRUST) && cosine > 0.0 {
        let scaled = f32::from(throttle) / cosine;
        output.throttle = scaled.clamp(0.0, f32::from(TILT_THROTTLE_MAX)) as i16;
    }

    if config.has(COMPENSATE_TILT) {
        let roll = f32::from(input.roll);
        let yaw = f32::from(input.yaw);
        output.roll = libm::rintf(roll * cosine + yaw * sine) as i16;
        output.yaw = libm::rintf(yaw * cosine + roll * sine) as i16;
    }
    output
}
