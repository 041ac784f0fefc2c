// src/config.rs

//! # Configuration
//!
//! A [`Config`] is an immutable snapshot of every tunable the core uses. It is
//! built once (usually from [`Config::default`] plus stored overrides),
//! checked with [`Config::validate`], then handed by reference to each
//! component constructor. Components copy what they need; nothing reads the
//! configuration from a global.
//!
//! Range violations are reported here and only here. The control path assumes
//! a validated snapshot.

use crate::arming::ArmingConfig;
use crate::axis::Axis;
use crate::error::{ConfigError, ConfigResult};
use crate::failsafe::FailsafeConfig;
use crate::mixer::tilt::TiltConfig;
use crate::mixer::{Airframe, MixerRule, OutputTarget, MAX_MOTORS, MAX_RULES, MAX_SERVOS};
use crate::pid::PidAlgorithm;

/// Lowest pulse a receiver channel or output can carry.
pub const PULSE_MIN: u16 = 1000;
/// Highest pulse a receiver channel or output can carry.
pub const PULSE_MAX: u16 = 2000;
/// Centre pulse.
pub const PULSE_MID: u16 = 1500;

/// Receiver channel interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxConfig {
    /// Stick centre pulse.
    pub mid_rc: u16,
    /// Below this pulse a stick counts as low.
    pub min_check: u16,
    /// Above this pulse a stick counts as high.
    pub max_check: u16,
    /// Roll/pitch deflection removed around centre.
    pub deadband: u8,
    /// Yaw deflection removed around centre.
    pub yaw_deadband: u8,
    /// Interpolate commands between receiver frames.
    pub rc_smoothing: bool,
    /// Expected interval between receiver frames in microseconds.
    pub refresh_interval_us: u32,
    /// Half width of the 3D throttle deadband around centre.
    pub deadband_3d_throttle: u16,
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            mid_rc: PULSE_MID,
            min_check: 1100,
            max_check: 1900,
            deadband: 0,
            yaw_deadband: 0,
            rc_smoothing: false,
            refresh_interval_us: 20_000,
            deadband_3d_throttle: 50,
        }
    }
}

/// Stick feel: rates, expo and throttle shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateProfile {
    /// Roll/pitch stick rate in percent.
    pub rc_rate: u8,
    /// Roll/pitch expo in percent.
    pub rc_expo: u8,
    /// Yaw expo in percent.
    pub rc_yaw_expo: u8,
    /// Throttle curve mid point in percent.
    pub thr_mid: u8,
    /// Throttle curve expo in percent.
    pub thr_expo: u8,
    /// Extra angular rate per axis (roll, pitch, yaw).
    pub rates: [u8; 3],
    /// Throttle PID attenuation at full throttle in percent.
    pub dyn_thr_pid: u8,
    /// Throttle pulse where attenuation starts.
    pub tpa_breakpoint: u16,
}

impl Default for RateProfile {
    fn default() -> Self {
        Self {
            rc_rate: 90,
            rc_expo: 65,
            rc_yaw_expo: 0,
            thr_mid: 50,
            thr_expo: 0,
            rates: [0; 3],
            dyn_thr_pid: 0,
            tpa_breakpoint: 1500,
        }
    }
}

/// P, I and D gains of one controller loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PidGains {
    /// Proportional gain.
    pub p: u8,
    /// Integral gain.
    pub i: u8,
    /// Derivative gain.
    pub d: u8,
}

impl PidGains {
    /// Creates a gain triple.
    pub const fn new(p: u8, i: u8, d: u8) -> Self {
        Self { p, i, d }
    }
}

/// Angle/rate controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidConfig {
    /// Active controller algorithm.
    pub algorithm: PidAlgorithm,
    /// Roll rate gains.
    pub roll: PidGains,
    /// Pitch rate gains.
    pub pitch: PidGains,
    /// Yaw rate gains.
    pub yaw: PidGains,
    /// Self level gains. P drives angle mode, D sets horizon sensitivity.
    pub level: PidGains,
    /// Symmetric limit on the yaw P term for airframes with 4+ motors.
    pub yaw_p_limit: u16,
    /// D term low-pass cutoff in Hz, 0 selects the moving average.
    pub dterm_cut_hz: u16,
    /// Largest commanded inclination in self level modes, decidegrees.
    pub max_angle_inclination: u16,
    /// Exempt the yaw integrator from the air mode anti-windup clamp.
    pub yaw_full_weight: bool,
    /// Control loop period in microseconds.
    pub looptime_us: u32,
}

impl PidConfig {
    /// Gains of a rate axis.
    pub fn axis(&self, axis: Axis) -> PidGains {
        match axis {
            Axis::Roll => self.roll,
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            algorithm: PidAlgorithm::Rewrite,
            roll: PidGains::new(40, 30, 23),
            pitch: PidGains::new(40, 30, 23),
            yaw: PidGains::new(85, 45, 0),
            level: PidGains::new(20, 10, 100),
            yaw_p_limit: 500,
            dterm_cut_hz: 0,
            max_angle_inclination: 500,
            yaw_full_weight: false,
            looptime_us: 3_500,
        }
    }
}

/// Motor pulse limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorConfig {
    /// Lowest pulse while armed.
    pub minthrottle: u16,
    /// Highest pulse.
    pub maxthrottle: u16,
    /// Pulse while disarmed or stopped.
    pub mincommand: u16,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            minthrottle: 1150,
            maxthrottle: 1850,
            mincommand: 1000,
        }
    }
}

/// Bidirectional motor pulse layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motor3dConfig {
    /// Top of the reverse range.
    pub deadband_low: u16,
    /// Bottom of the forward range.
    pub deadband_high: u16,
    /// Pulse that stops a bidirectional motor.
    pub neutral: u16,
}

impl Default for Motor3dConfig {
    fn default() -> Self {
        Self {
            deadband_low: 1406,
            deadband_high: 1514,
            neutral: 1460,
        }
    }
}

/// Servo output channel calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoConfig {
    /// Lowest pulse.
    pub min: u16,
    /// Highest pulse.
    pub max: u16,
    /// Pulse at zero demand.
    pub middle: u16,
    /// Gain applied to the mixed demand in percent, negative reverses.
    pub rate: i8,
    /// Bit `n` reverses the contribution of mixer input `n`.
    pub reversed_inputs: u32,
    /// Receiver channel whose pulse replaces `middle`.
    pub forward_from: Option<u8>,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            min: PULSE_MIN,
            max: PULSE_MAX,
            middle: PULSE_MID,
            rate: 100,
            reversed_inputs: 0,
            forward_from: None,
        }
    }
}

/// Mixer behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MixerConfig {
    /// Airframe preset providing the rule table.
    pub airframe: Airframe,
    /// Rules used when `airframe` is [`Airframe::Custom`].
    pub custom_rules: heapless::Vec<MixerRule, MAX_RULES>,
    /// Keep stabilising at minimum throttle instead of idling at `minthrottle`.
    pub pid_at_min_throttle: bool,
    /// Stop motors at `mincommand` when throttle is below `min_check`.
    pub motor_stop: bool,
    /// Bidirectional motors.
    pub feature_3d: bool,
    /// Direction multiplier for yaw on motors, 1 or -1.
    pub yaw_motor_direction: i8,
    /// Limit on yaw demand above the stick yaw, for 4+ motor airframes.
    pub yaw_jump_prevention_limit: u16,
    /// Keep tricopter servo live while disarmed.
    pub tri_unarmed_servo: bool,
    /// Smooth servo outputs with a low-pass filter.
    pub servo_lowpass_enable: bool,
    /// Servo low-pass cutoff in Hz.
    pub servo_lowpass_freq_hz: u16,
    /// Servo calibration, one per servo output.
    pub servos: [ServoConfig; MAX_SERVOS],
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            airframe: Airframe::QuadX,
            custom_rules: heapless::Vec::new(),
            pid_at_min_throttle: true,
            motor_stop: false,
            feature_3d: false,
            yaw_motor_direction: 1,
            yaw_jump_prevention_limit: 200,
            tri_unarmed_servo: true,
            servo_lowpass_enable: false,
            servo_lowpass_freq_hz: 400,
            servos: [ServoConfig::default(); MAX_SERVOS],
        }
    }
}

/// Complete configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Receiver interpretation.
    pub rx: RxConfig,
    /// Stick feel.
    pub rates: RateProfile,
    /// Controller tuning.
    pub pid: PidConfig,
    /// Mixer behaviour.
    pub mixer: MixerConfig,
    /// Motor pulse limits.
    pub motors: MotorConfig,
    /// Bidirectional motor layout.
    pub motor_3d: Motor3dConfig,
    /// Tilt rotor compensation.
    pub tilt: TiltConfig,
    /// Arming timings and safety.
    pub arming: ArmingConfig,
    /// Signal loss procedure.
    pub failsafe: FailsafeConfig,
}

fn at_most(name: &'static str, value: i32, max: i32) -> ConfigResult<()> {
    if value > max {
        Err(ConfigError::OutOfRange { name, value, max })
    } else {
        Ok(())
    }
}

fn at_least(name: &'static str, value: i32, min: i32) -> ConfigResult<()> {
    if value < min {
        Err(ConfigError::BelowMinimum { name, value, min })
    } else {
        Ok(())
    }
}

impl Config {
    /// Checks every range constraint. The first violation found is returned.
    pub fn validate(&self) -> ConfigResult<()> {
        self.validate_rx()?;
        self.validate_rates()?;
        self.validate_pid()?;
        self.validate_outputs()?;
        self.tilt.validate()?;
        Ok(())
    }

    fn validate_rx(&self) -> ConfigResult<()> {
        let rx = &self.rx;
        if rx.min_check >= rx.max_check || rx.min_check < PULSE_MIN || rx.max_check > PULSE_MAX {
            return Err(ConfigError::CheckBand {
                min_check: rx.min_check,
                max_check: rx.max_check,
            });
        }
        if rx.mid_rc <= rx.min_check || rx.mid_rc >= rx.max_check {
            return Err(ConfigError::MidPoint(rx.mid_rc));
        }
        at_most("deadband", rx.deadband.into(), 32)?;
        at_most("yaw_deadband", rx.yaw_deadband.into(), 100)?;
        at_least("refresh_interval_us", rx.refresh_interval_us as i32, 1)?;
        Ok(())
    }

    fn validate_rates(&self) -> ConfigResult<()> {
        let rates = &self.rates;
        at_most("rc_rate", rates.rc_rate.into(), 250)?;
        at_most("rc_expo", rates.rc_expo.into(), 100)?;
        at_most("rc_yaw_expo", rates.rc_yaw_expo.into(), 100)?;
        at_most("thr_mid", rates.thr_mid.into(), 100)?;
        at_most("thr_expo", rates.thr_expo.into(), 100)?;
        for rate in rates.rates {
            at_most("rates", rate.into(), 100)?;
        }
        at_most("dyn_thr_pid", rates.dyn_thr_pid.into(), 100)?;
        at_least("tpa_breakpoint", rates.tpa_breakpoint.into(), PULSE_MIN.into())?;
        at_most("tpa_breakpoint", rates.tpa_breakpoint.into(), PULSE_MAX.into())?;
        Ok(())
    }

    fn validate_pid(&self) -> ConfigResult<()> {
        let pid = &self.pid;
        at_least("yaw_p_limit", pid.yaw_p_limit.into(), 100)?;
        at_most("yaw_p_limit", pid.yaw_p_limit.into(), 500)?;
        at_most("max_angle_inclination", pid.max_angle_inclination.into(), 900)?;
        at_least("looptime_us", pid.looptime_us as i32, 125)?;
        at_most("looptime_us", pid.looptime_us as i32, 65_535)?;
        if pid.dterm_cut_hz > 0 {
            // cutoff must stay below Nyquist of the loop rate
            let nyquist = 500_000 / pid.looptime_us;
            at_most("dterm_cut_hz", pid.dterm_cut_hz.into(), nyquist as i32)?;
        }
        Ok(())
    }

    fn validate_outputs(&self) -> ConfigResult<()> {
        let motors = &self.motors;
        if motors.mincommand > motors.minthrottle
            || motors.minthrottle >= motors.maxthrottle
            || motors.mincommand < PULSE_MIN
            || motors.maxthrottle > PULSE_MAX
        {
            return Err(ConfigError::MotorRange {
                mincommand: motors.mincommand,
                minthrottle: motors.minthrottle,
                maxthrottle: motors.maxthrottle,
            });
        }

        for (index, servo) in self.mixer.servos.iter().enumerate() {
            if servo.min >= servo.max || servo.middle < servo.min || servo.middle > servo.max {
                return Err(ConfigError::OutputChannel { index });
            }
        }

        let mixer = &self.mixer;
        if mixer.yaw_motor_direction != 1 && mixer.yaw_motor_direction != -1 {
            return Err(ConfigError::OutOfRange {
                name: "yaw_motor_direction",
                value: mixer.yaw_motor_direction.into(),
                max: 1,
            });
        }
        at_most(
            "yaw_jump_prevention_limit",
            mixer.yaw_jump_prevention_limit.into(),
            500,
        )?;
        if mixer.servo_lowpass_enable {
            at_least("servo_lowpass_freq_hz", mixer.servo_lowpass_freq_hz.into(), 10)?;
            at_most("servo_lowpass_freq_hz", mixer.servo_lowpass_freq_hz.into(), 400)?;
        }

        for (index, rule) in mixer.custom_rules.iter().enumerate() {
            let target_ok = match rule.target {
                OutputTarget::Motor(m) => usize::from(m) < MAX_MOTORS,
                OutputTarget::Servo(s) => usize::from(s) < MAX_SERVOS,
            };
            if !target_ok || !rule.is_valid() {
                return Err(ConfigError::MixerRule { index });
            }
        }
        Ok(())
    }
}
