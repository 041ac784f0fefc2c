// src/mixer.rs

//! # Mixer
//!
//! Turns controller demands and pass-through receiver channels into motor
//! and servo pulses with a flat table of [`MixerRule`]s.
//!
//! Each rule feeds one input into one output:
//!
//! 1. the input value follows the live value at most `speed` units per
//!    iteration when `speed > 0`;
//! 2. the term `rate * value / 100` is clamped to the rule window
//!    `[min * 10 - 500, max * 10 - 500]`;
//! 3. servo terms are negated when the input is reversed for that servo.
//!
//! Servo channels add the summed terms, scaled by the channel rate and pulse
//! span, to their middle pulse (or a forwarded receiver channel), then
//! optionally low-pass filter and clamp the result.
//!
//! Motor channels start at the centre pulse plus the throttle terms, add the
//! roll/pitch/yaw mix and go through the motor stage: yaw jump prevention,
//! overshoot removal (or air mode scaling), then the [`OutputPath`] limits.

pub mod airframe;
pub mod tilt;

pub use airframe::Airframe;

use crate::config::{Config, Motor3dConfig, MixerConfig, MotorConfig, PULSE_MID};
use crate::pid::filter::Biquad;
use heapless::Vec;
use tilt::{TiltConfig, TiltInput};

/// Largest number of motor outputs.
pub const MAX_MOTORS: usize = 8;
/// Largest number of servo outputs.
pub const MAX_SERVOS: usize = 8;
/// Largest number of mixer rules.
pub const MAX_RULES: usize = 48;
/// Number of mixer inputs.
pub const INPUT_COUNT: usize = 14;
/// Yaw jump prevention limits at or above this value disable the clamp.
pub const YAW_JUMP_PREVENTION_LIMIT_HIGH: u16 = 500;

/// Largest servo rule rate in percent.
pub const SERVO_RATE_LIMIT: i16 = 125;
/// Largest motor rule rate in percent.
pub const MOTOR_RATE_LIMIT: i16 = 200;

/// Signals a rule can read. All values are centred on zero, nominally
/// `-500..=500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MixerInput {
    /// Stabilised roll demand.
    Roll = 0,
    /// Stabilised pitch demand.
    Pitch,
    /// Stabilised yaw demand.
    Yaw,
    /// Throttle, offset from the centre pulse.
    Throttle,
    /// Roll receiver channel.
    RcRoll,
    /// Pitch receiver channel.
    RcPitch,
    /// Yaw receiver channel.
    RcYaw,
    /// Throttle receiver channel.
    RcThrottle,
    /// First auxiliary receiver channel.
    RcAux1,
    /// Second auxiliary receiver channel.
    RcAux2,
    /// Third auxiliary receiver channel.
    RcAux3,
    /// Fourth auxiliary receiver channel.
    RcAux4,
    /// Body pitch for camera stabilisation.
    GimbalPitch,
    /// Body roll for camera stabilisation.
    GimbalRoll,
}

impl MixerInput {
    /// Position of the input in the input table and reversal mask.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Input carrying receiver channel `channel` unchanged.
    pub const fn from_rc_channel(channel: u8) -> Option<Self> {
        Some(match channel {
            0 => MixerInput::RcRoll,
            1 => MixerInput::RcPitch,
            2 => MixerInput::RcYaw,
            3 => MixerInput::RcThrottle,
            4 => MixerInput::RcAux1,
            5 => MixerInput::RcAux2,
            6 => MixerInput::RcAux3,
            7 => MixerInput::RcAux4,
            _ => return None,
        })
    }
}

/// Output a rule drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputTarget {
    /// Motor output by index.
    Motor(u8),
    /// Servo output by index.
    Servo(u8),
}

/// One input to output contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MixerRule {
    /// Driven output.
    pub target: OutputTarget,
    /// Source signal.
    pub input: MixerInput,
    /// Gain in percent, negative reverses.
    pub rate: i16,
    /// Largest input change per iteration, 0 follows immediately.
    pub speed: u8,
    /// Lower end of the rule window in percent of the output span.
    pub min: u8,
    /// Upper end of the rule window in percent of the output span.
    pub max: u8,
    /// 1-based switch bit that must be active, `None` for always.
    pub condition: Option<u8>,
}

impl MixerRule {
    /// Unconditional rule with an unrestricted window.
    pub const fn new(target: OutputTarget, input: MixerInput, rate: i16) -> Self {
        Self {
            target,
            input,
            rate,
            speed: 0,
            min: 0,
            max: 100,
            condition: None,
        }
    }

    /// Limits how fast the rule follows its input.
    pub const fn with_speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    /// Restricts the rule window.
    pub const fn with_window(mut self, min: u8, max: u8) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Makes the rule depend on switch `bit` (1-based).
    pub const fn with_condition(mut self, bit: u8) -> Self {
        self.condition = Some(bit);
        self
    }

    /// Whether the rate and window are in range for the target kind.
    pub fn is_valid(&self) -> bool {
        let limit = match self.target {
            OutputTarget::Motor(_) => MOTOR_RATE_LIMIT,
            OutputTarget::Servo(_) => SERVO_RATE_LIMIT,
        };
        let condition_ok = match self.condition {
            Some(bit) => (1..=32).contains(&bit),
            None => true,
        };
        (-limit..=limit).contains(&self.rate) && self.min <= self.max && self.max <= 100 && condition_ok
    }

    fn active(&self, switches: u32) -> bool {
        match self.condition {
            Some(bit) => bit > 0 && bit <= 32 && switches & (1 << (bit - 1)) != 0,
            None => true,
        }
    }

    fn window(&self) -> (i32, i32) {
        (i32::from(self.min) * 10 - 500, i32::from(self.max) * 10 - 500)
    }
}

/// Which set of motor limits applies.
///
/// Exactly one path is live per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputPath {
    /// Motors idle at the disarmed pulse.
    #[default]
    Disarmed,
    /// Armed flight limits.
    Normal,
    /// Failsafe owns the throttle, motors may drop to `mincommand`.
    FailsafeForced,
}

/// Per iteration context of [`Mixer::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MixerFrame {
    /// Active output path.
    pub path: OutputPath,
    /// Scale the roll/pitch/yaw mix into the throttle range.
    pub airmode: bool,
    /// Raw throttle receiver pulse.
    pub throttle_pulse: u16,
    /// Shaped yaw stick command, for yaw jump prevention.
    pub yaw_command: i16,
    /// Measured body pitch in decidegrees, for tilt compensation.
    pub body_pitch_dd: i16,
    /// Active switch bits for conditional rules.
    pub switches: u32,
}

impl Default for MixerFrame {
    fn default() -> Self {
        Self {
            path: OutputPath::Disarmed,
            airmode: false,
            throttle_pulse: PULSE_MID,
            yaw_command: 0,
            body_pitch_dd: 0,
            switches: 0,
        }
    }
}

/// Pulses of the last update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MixerOutputs {
    /// Motor pulses.
    pub motors: Vec<u16, MAX_MOTORS>,
    /// Servo pulses.
    pub servos: Vec<u16, MAX_SERVOS>,
}

fn constrain(value: i32, low: i32, high: i32) -> i32 {
    value.max(low).min(high)
}

fn to_pulse(value: i32) -> u16 {
    constrain(value, 0, i32::from(u16::MAX)) as u16
}

/// Rule based motor and servo mixer.
#[derive(Debug, Clone)]
pub struct Mixer {
    config: MixerConfig,
    motors: MotorConfig,
    motor_3d: Motor3dConfig,
    tilt: TiltConfig,
    min_check: u16,
    mid_rc: u16,
    deadband_3d_throttle: u16,
    rules: Vec<MixerRule, MAX_RULES>,
    followers: [i32; MAX_RULES],
    inputs: [i16; INPUT_COUNT],
    motor_count: usize,
    servo_count: usize,
    servo_filters: [Biquad; MAX_SERVOS],
    reversed_3d: bool,
    motor_limit_reached: bool,
    outputs: MixerOutputs,
}

impl Mixer {
    /// Builds the rule table for the configured airframe.
    pub fn new(config: &Config) -> Self {
        let mixer = &config.mixer;
        let mut rules = match mixer.airframe {
            Airframe::Custom => mixer.custom_rules.clone(),
            airframe => airframe.rules(),
        };

        let count = |servo: bool| {
            rules
                .iter()
                .filter_map(|rule| match (rule.target, servo) {
                    (OutputTarget::Motor(index), false) | (OutputTarget::Servo(index), true) => Some(usize::from(index) + 1),
                    _ => None,
                })
                .max()
                .unwrap_or(0)
        };
        let motor_count = count(false).min(MAX_MOTORS);
        let servo_count = count(true).min(MAX_SERVOS);

        if mixer.feature_3d && motor_count > 1 {
            for rule in rules.iter_mut() {
                if matches!(rule.target, OutputTarget::Motor(_)) && rule.input != MixerInput::Throttle {
                    rule.rate /= 2;
                }
            }
        }

        let filter = Biquad::low_pass(f32::from(mixer.servo_lowpass_freq_hz), config.pid.looptime_us);
        log_info!("mixer: {} motors, {} servos, {} rules", motor_count, servo_count, rules.len());

        let mut this = Self {
            config: mixer.clone(),
            motors: config.motors,
            motor_3d: config.motor_3d,
            tilt: config.tilt,
            min_check: config.rx.min_check,
            mid_rc: config.rx.mid_rc,
            deadband_3d_throttle: config.rx.deadband_3d_throttle,
            rules,
            followers: [0; MAX_RULES],
            inputs: [0; INPUT_COUNT],
            motor_count,
            servo_count,
            servo_filters: [filter; MAX_SERVOS],
            reversed_3d: false,
            motor_limit_reached: false,
            outputs: MixerOutputs::default(),
        };
        this.write_disarmed();
        this
    }

    /// Sets one input.
    pub fn set_input(&mut self, input: MixerInput, value: i16) {
        self.inputs[input.index()] = value;
    }

    /// Replaces the whole input table.
    pub fn set_inputs(&mut self, values: [i16; INPUT_COUNT]) {
        self.inputs = values;
    }

    /// Current value of an input.
    pub fn input(&self, input: MixerInput) -> i16 {
        self.inputs[input.index()]
    }

    /// Number of motor outputs.
    pub fn motor_count(&self) -> usize {
        self.motor_count
    }

    /// Number of servo outputs.
    pub fn servo_count(&self) -> usize {
        self.servo_count
    }

    /// Active rule table.
    pub fn rules(&self) -> &[MixerRule] {
        &self.rules
    }

    /// Whether the last update had to cut the mix to fit the motor range.
    pub fn motor_limit_reached(&self) -> bool {
        self.motor_limit_reached
    }

    /// Pulses of the last update.
    pub fn outputs(&self) -> &MixerOutputs {
        &self.outputs
    }

    /// Runs one mixing iteration.
    pub fn update(&mut self, frame: &MixerFrame) -> &MixerOutputs {
        let mut inputs = self.inputs;
        self.limit_yaw_jump(&mut inputs, frame.yaw_command);
        if self.config.airframe.is_tilt_rotor() {
            self.compensate_tilt(&mut inputs, frame.body_pitch_dd);
        }

        let mut throttle = [0i32; MAX_MOTORS];
        let mut mix = [0i32; MAX_MOTORS];
        let mut servo_sum = [0i32; MAX_SERVOS];
        let yaw_direction = -i32::from(self.config.yaw_motor_direction);

        for index in 0..self.rules.len() {
            let rule = self.rules[index];
            let OutputTarget::Motor(motor) = rule.target else {
                continue;
            };
            let Some(term) = self.rule_term(index, inputs[rule.input.index()], frame.switches) else {
                continue;
            };
            let motor = usize::from(motor);
            match rule.input {
                MixerInput::Throttle => throttle[motor] += term,
                MixerInput::Yaw => mix[motor] += yaw_direction * term,
                _ => mix[motor] += term,
            }
        }
        let motors = self.mix_motors(frame, &throttle, &mix);

        // servos read the throttle actually sent to the first motor
        let mut servo_inputs = inputs;
        if let Some(first) = motors.first() {
            servo_inputs[MixerInput::Throttle.index()] = (i32::from(*first) - i32::from(PULSE_MID)) as i16;
        }
        if self.config.feature_3d && frame.throttle_pulse < self.mid_rc {
            let yaw = &mut servo_inputs[MixerInput::Yaw.index()];
            *yaw = yaw.saturating_neg();
        }
        for index in 0..self.rules.len() {
            let rule = self.rules[index];
            let OutputTarget::Servo(servo) = rule.target else {
                continue;
            };
            let Some(term) = self.rule_term(index, servo_inputs[rule.input.index()], frame.switches) else {
                continue;
            };
            let servo = usize::from(servo);
            let reversed = self.config.servos[servo].reversed_inputs & (1 << rule.input.index()) != 0;
            servo_sum[servo] += if reversed { -term } else { term };
        }

        let live_servos = frame.path != OutputPath::Disarmed
            || (self.config.airframe.is_tricopter() && self.config.tri_unarmed_servo);
        self.outputs.motors = motors;
        self.outputs.servos.clear();
        for (servo, sum) in servo_sum.iter().enumerate().take(self.servo_count) {
            let pulse = if live_servos {
                self.servo_pulse(servo, *sum)
            } else {
                self.servo_filters[servo].reset();
                self.config.servos[servo].middle
            };
            let _ = self.outputs.servos.push(pulse);
        }
        &self.outputs
    }

    fn limit_yaw_jump(&self, inputs: &mut [i16; INPUT_COUNT], yaw_command: i16) {
        let limit = self.config.yaw_jump_prevention_limit;
        if self.motor_count >= 4 && limit < YAW_JUMP_PREVENTION_LIMIT_HIGH {
            let bound = i32::from(limit) + i32::from(yaw_command.unsigned_abs());
            let yaw = &mut inputs[MixerInput::Yaw.index()];
            *yaw = constrain(i32::from(*yaw), -bound, bound) as i16;
        }
    }

    fn compensate_tilt(&self, inputs: &mut [i16; INPUT_COUNT], body_pitch_dd: i16) {
        let control = inputs[self.tilt.control_channel.index()];
        let output = tilt::compensate(
            &self.tilt,
            &TiltInput {
                throttle: inputs[MixerInput::Throttle.index()].saturating_add(500),
                roll: inputs[MixerInput::Roll.index()],
                pitch: inputs[MixerInput::Pitch.index()],
                yaw: inputs[MixerInput::Yaw.index()],
                motor_pitch_dd: self.tilt.motor_pitch_dd(control),
                body_pitch_dd,
            },
        );
        inputs[MixerInput::Throttle.index()] = output.throttle - 500;
        inputs[MixerInput::Roll.index()] = output.roll;
        inputs[MixerInput::Pitch.index()] = output.pitch;
        inputs[MixerInput::Yaw.index()] = output.yaw;
    }

    fn rule_term(&mut self, index: usize, value: i16, switches: u32) -> Option<i32> {
        let rule = self.rules[index];
        let follower = &mut self.followers[index];
        if !rule.active(switches) {
            *follower = 0;
            return None;
        }
        let value = i32::from(value);
        *follower = if rule.speed == 0 {
            value
        } else {
            let speed = i32::from(rule.speed);
            constrain(value, *follower - speed, *follower + speed)
        };
        let (low, high) = rule.window();
        Some(constrain(i32::from(rule.rate) * *follower / 100, low, high))
    }

    fn servo_pulse(&mut self, servo: usize, sum: i32) -> u16 {
        let channel = self.config.servos[servo];
        let middle = channel
            .forward_from
            .and_then(MixerInput::from_rc_channel)
            .map(|input| i32::from(self.mid_rc) + i32::from(self.inputs[input.index()]))
            .unwrap_or(i32::from(channel.middle));
        let span = i32::from(channel.max) - i32::from(channel.min);
        let mut pulse = middle + (sum * i32::from(channel.rate) / 100) * span / 1000;
        if self.config.servo_lowpass_enable {
            pulse = libm::rintf(self.servo_filters[servo].apply(pulse as f32)) as i32;
        }
        to_pulse(constrain(pulse, channel.min.into(), channel.max.into()))
    }

    fn disarmed_pulse(&self) -> u16 {
        if self.config.feature_3d {
            self.motor_3d.neutral
        } else {
            self.motors.mincommand
        }
    }

    fn write_disarmed(&mut self) {
        let pulse = self.disarmed_pulse();
        self.outputs.motors.clear();
        for _ in 0..self.motor_count {
            let _ = self.outputs.motors.push(pulse);
        }
        self.outputs.servos.clear();
        for servo in 0..self.servo_count {
            let _ = self.outputs.servos.push(self.config.servos[servo].middle);
        }
    }

    /// Throttle window for air mode and the base throttle for 3D.
    fn throttle_window_3d(&mut self, pulse: u16) -> (i32, i32, i32) {
        let motors = self.motors;
        let motor_3d = self.motor_3d;
        let mid = i32::from(self.mid_rc);
        let deadband = i32::from(self.deadband_3d_throttle);
        let pulse = i32::from(pulse);
        let (min_throttle, max_throttle) = (i32::from(motors.minthrottle), i32::from(motors.maxthrottle));
        let (low, high) = (i32::from(motor_3d.deadband_low), i32::from(motor_3d.deadband_high));

        if pulse <= mid - deadband {
            self.reversed_3d = true;
            (min_throttle, low, pulse)
        } else if pulse >= mid + deadband {
            self.reversed_3d = false;
            (high, max_throttle, pulse)
        } else if self.reversed_3d {
            (min_throttle, low, low)
        } else {
            (high, max_throttle, high)
        }
    }

    fn mix_motors(&mut self, frame: &MixerFrame, throttle: &[i32; MAX_MOTORS], mix: &[i32; MAX_MOTORS]) -> Vec<u16, MAX_MOTORS> {
        let count = self.motor_count;
        let mid = i32::from(PULSE_MID);
        let min_throttle = i32::from(self.motors.minthrottle);
        let max_throttle = i32::from(self.motors.maxthrottle);
        let min_command = i32::from(self.motors.mincommand);
        let mut motor = [0i32; MAX_MOTORS];

        if frame.path == OutputPath::Disarmed {
            self.reversed_3d = false;
            self.motor_limit_reached = false;
            let pulse = self.disarmed_pulse();
            return (0..count).map(|_| pulse).collect();
        }

        if frame.airmode {
            let mut mix = *mix;
            let mix_max = mix[..count].iter().copied().fold(0, i32::max);
            let mix_min = mix[..count].iter().copied().fold(0, i32::min);
            let mix_range = mix_max - mix_min;

            let (mut low, mut high, base) = if self.config.feature_3d {
                let (low, high, base) = self.throttle_window_3d(frame.throttle_pulse);
                (low, high, Some(base))
            } else {
                (min_throttle, max_throttle, None)
            };
            let throttle_range = high - low;
            if mix_range > throttle_range {
                self.motor_limit_reached = true;
                let reduction = throttle_range as f32 / mix_range as f32;
                for value in mix[..count].iter_mut() {
                    *value = libm::rintf(*value as f32 * reduction) as i32;
                }
                low += throttle_range / 2;
                high = low;
            } else {
                self.motor_limit_reached = false;
                low += mix_range / 2;
                high -= mix_range / 2;
            }
            for i in 0..count {
                let base = base.unwrap_or(mid + throttle[i]);
                motor[i] = mix[i] + constrain(base, low, high);
                motor[i] = match frame.path {
                    OutputPath::FailsafeForced => constrain(motor[i], min_command, max_throttle),
                    _ if self.config.feature_3d => self.constrain_3d_half(motor[i]),
                    _ => constrain(motor[i], min_throttle, max_throttle),
                };
            }
        } else {
            for i in 0..count {
                motor[i] = mid + throttle[i] + mix[i];
            }
            let highest = motor[..count].iter().copied().max().unwrap_or(0);
            let overshoot = (highest - max_throttle).max(0);
            self.motor_limit_reached = overshoot > 0;
            for value in motor[..count].iter_mut() {
                *value -= overshoot;
                *value = match frame.path {
                    OutputPath::FailsafeForced => constrain(*value, min_command, max_throttle),
                    _ if self.config.feature_3d => self.constrain_3d(*value, frame.throttle_pulse),
                    _ => self.constrain_normal(*value, frame.throttle_pulse),
                };
            }
        }
        motor[..count].iter().map(|value| to_pulse(*value)).collect()
    }

    fn constrain_normal(&self, value: i32, throttle_pulse: u16) -> i32 {
        let motors = &self.motors;
        let value = constrain(value, motors.minthrottle.into(), motors.maxthrottle.into());
        if throttle_pulse < self.min_check {
            if self.config.motor_stop {
                return motors.mincommand.into();
            }
            if !self.config.pid_at_min_throttle {
                return motors.minthrottle.into();
            }
        }
        value
    }

    fn constrain_3d_half(&self, value: i32) -> i32 {
        if self.reversed_3d {
            constrain(value, self.motors.minthrottle.into(), self.motor_3d.deadband_low.into())
        } else {
            constrain(value, self.motor_3d.deadband_high.into(), self.motors.maxthrottle.into())
        }
    }

    fn constrain_3d(&self, value: i32, throttle_pulse: u16) -> i32 {
        let mid = i32::from(self.mid_rc);
        let deadband = i32::from(self.deadband_3d_throttle);
        let pulse = i32::from(throttle_pulse);
        let forward = pulse > mid;
        if self.config.pid_at_min_throttle || pulse <= mid - deadband || pulse >= mid + deadband {
            if forward {
                constrain(value, self.motor_3d.deadband_high.into(), self.motors.maxthrottle.into())
            } else {
                constrain(value, self.motors.mincommand.into(), self.motor_3d.deadband_low.into())
            }
        } else if forward {
            self.motor_3d.deadband_high.into()
        } else {
            self.motor_3d.deadband_low.into()
        }
    }
}
