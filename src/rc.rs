// src/rc.rs

//! # RC Input Shaping
//!
//! Turns raw receiver pulses into stick commands the controller understands.
//!
//! ## Pipeline
//!
//! 1. Deflection from `mid_rc` with the configured deadband removed.
//! 2. Magnitude mapped through the rate/expo curve, sign restored for
//!    sticks below centre.
//! 3. Throttle mapped from `[min_check, 2000]` onto `[0, 1000]`, then through
//!    the throttle curve.
//! 4. Optional interpolation between receiver frames.
//! 5. Yaw held at zero on the ground while armed by sticks, so the yaw arming
//!    gesture does not spin the craft.
//!
//! The shaper owns its curves and smoothing history. The composition root
//! copies the resulting [`RcCommand`] into the controller.

pub mod curve;
pub mod smoothing;
pub mod sticks;

use crate::axis::Axis;
use crate::config::{Config, RateProfile, RxConfig, PULSE_MAX, PULSE_MID, PULSE_MIN};
use curve::{RcCurves, MAX_DEFLECTION, MAX_THROTTLE};
use smoothing::RcSmoother;

/// Receiver channels carried by a frame.
pub const RC_CHANNEL_COUNT: usize = 8;

/// Channel positions inside [`RcChannels::pulses`].
pub mod channel {
    /// Roll stick.
    pub const ROLL: usize = 0;
    /// Pitch stick.
    pub const PITCH: usize = 1;
    /// Yaw stick.
    pub const YAW: usize = 2;
    /// Throttle stick.
    pub const THROTTLE: usize = 3;
    /// First auxiliary switch.
    pub const AUX1: usize = 4;
}

/// One receiver frame in pulse units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    /// Pulse per channel, in [`channel`] order.
    pub pulses: [u16; RC_CHANNEL_COUNT],
}

impl Default for RcChannels {
    fn default() -> Self {
        let mut pulses = [PULSE_MID; RC_CHANNEL_COUNT];
        pulses[channel::THROTTLE] = PULSE_MIN;
        Self { pulses }
    }
}

impl RcChannels {
    /// Wraps a pulse array.
    pub const fn new(pulses: [u16; RC_CHANNEL_COUNT]) -> Self {
        Self { pulses }
    }

    /// Pulse of a channel, `mid` when the channel does not exist.
    pub fn get(&self, index: usize) -> u16 {
        self.pulses.get(index).copied().unwrap_or(PULSE_MID)
    }

    /// Pulse of an attitude stick.
    pub fn stick(&self, axis: Axis) -> u16 {
        match axis {
            Axis::Roll => self.pulses[channel::ROLL],
            Axis::Pitch => self.pulses[channel::PITCH],
            Axis::Yaw => self.pulses[channel::YAW],
        }
    }

    /// Throttle pulse.
    pub fn throttle(&self) -> u16 {
        self.pulses[channel::THROTTLE]
    }

    /// Pulse of auxiliary channel `n`, zero based.
    pub fn aux(&self, n: usize) -> u16 {
        self.get(channel::AUX1 + n)
    }

    /// Offset of a channel from `mid`, for mixer inputs.
    pub fn centered(&self, index: usize, mid: u16) -> i32 {
        i32::from(self.get(index)) - i32::from(mid)
    }
}

/// Shaped stick command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcCommand {
    /// Roll, about -500..=500 scaled by the stick rate.
    pub roll: i16,
    /// Pitch, same scale as roll.
    pub pitch: i16,
    /// Yaw, same scale as roll.
    pub yaw: i16,
    /// Throttle, 0..=1000.
    pub throttle: i16,
}

impl RcCommand {
    /// Command of an attitude axis.
    pub fn axis(&self, axis: Axis) -> i16 {
        match axis {
            Axis::Roll => self.roll,
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
        }
    }

    fn as_array(&self) -> [i32; 4] {
        [
            self.roll.into(),
            self.pitch.into(),
            self.yaw.into(),
            self.throttle.into(),
        ]
    }

    fn from_array(values: [i32; 4]) -> Self {
        Self {
            roll: values[0] as i16,
            pitch: values[1] as i16,
            yaw: values[2] as i16,
            throttle: values[3] as i16,
        }
    }
}

/// Per iteration facts the shaper needs besides the frame itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeContext {
    /// A new receiver frame arrived since the previous iteration.
    pub fresh: bool,
    /// Control loop period in microseconds.
    pub dt_us: u32,
    /// The craft was armed with the stick gesture.
    pub armed_by_sticks: bool,
}

/// Stick to command shaping with its own curves and smoothing history.
#[derive(Debug, Clone)]
pub struct RcShaper {
    rx: RxConfig,
    rates: RateProfile,
    curves: RcCurves,
    smoother: RcSmoother,
    keep_yaw_on_ground: bool,
    command: RcCommand,
}

impl RcShaper {
    /// Builds a shaper from a validated configuration.
    pub fn new(config: &Config) -> Self {
        let airframe = config.mixer.airframe;
        let keep_yaw_on_ground =
            airframe.is_fixed_wing() || (airframe.is_tricopter() && config.mixer.tri_unarmed_servo);
        Self {
            rx: config.rx,
            rates: config.rates,
            curves: RcCurves::new(&config.rates),
            smoother: RcSmoother::new(),
            keep_yaw_on_ground,
            command: RcCommand::default(),
        }
    }

    /// Swaps the rate profile and rebuilds the curves.
    pub fn set_rate_profile(&mut self, rates: RateProfile) {
        if rates != self.rates {
            self.rates = rates;
            self.curves = RcCurves::new(&rates);
        }
    }

    /// Active rate profile.
    pub fn rate_profile(&self) -> &RateProfile {
        &self.rates
    }

    /// Shapes one frame and stores the result as the current command.
    pub fn shape(&mut self, channels: &RcChannels, context: ShapeContext) -> RcCommand {
        let mut command = RcCommand {
            roll: self.shape_stick(Axis::Roll, channels.stick(Axis::Roll)) as i16,
            pitch: self.shape_stick(Axis::Pitch, channels.stick(Axis::Pitch)) as i16,
            yaw: self.shape_stick(Axis::Yaw, channels.stick(Axis::Yaw)) as i16,
            throttle: self.shape_throttle(channels.throttle()) as i16,
        };

        if self.rx.rc_smoothing {
            let mut values = command.as_array();
            self.smoother
                .apply(&mut values, context.fresh, self.rx.refresh_interval_us, context.dt_us);
            command = RcCommand::from_array(values);
        }

        if context.armed_by_sticks && channels.throttle() <= self.rx.min_check && !self.keep_yaw_on_ground {
            command.yaw = 0;
        }

        self.command = command;
        command
    }

    fn shape_stick(&self, axis: Axis, pulse: u16) -> i32 {
        let deadband = match axis {
            Axis::Yaw => self.rx.yaw_deadband,
            _ => self.rx.deadband,
        };
        let raw = i32::from(pulse) - i32::from(self.rx.mid_rc);
        let mut magnitude = raw.abs().min(MAX_DEFLECTION);
        if deadband > 0 {
            magnitude = (magnitude - i32::from(deadband)).max(0);
        }
        let shaped = self.curves.lookup_stick(axis, magnitude);
        if raw < 0 {
            -shaped
        } else {
            shaped
        }
    }

    fn shape_throttle(&self, pulse: u16) -> i32 {
        let min_check = i32::from(self.rx.min_check);
        let span = (i32::from(PULSE_MAX) - min_check).max(1);
        let clamped = i32::from(pulse).clamp(min_check, i32::from(PULSE_MAX));
        let linear = (clamped - min_check) * MAX_THROTTLE / span;
        self.curves.lookup_throttle(linear)
    }

    /// Most recent command.
    pub fn command(&self) -> RcCommand {
        self.command
    }

    /// Commanded inclination of an axis in decidegrees.
    pub fn angle_command(&self, axis: Axis) -> i32 {
        i32::from(self.command.axis(axis)) * 450 / 500
    }

    /// Commanded body rate of an axis including the per-axis extra rate.
    pub fn rate_command(&self, axis: Axis) -> i32 {
        let rate = i32::from(self.rates.rates[axis.index()]);
        (16 + rate) * i32::from(self.command.axis(axis)) / 16
    }

    /// Drops the smoothing history.
    pub fn reset(&mut self) {
        self.smoother.reset();
        self.command = RcCommand::default();
    }
}
