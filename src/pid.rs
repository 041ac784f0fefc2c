// src/pid.rs

//! # Angle/Rate PID Control Module
//!
//! The controller turns the shaped stick command, the measured body rates
//! and, in self levelling modes, the measured attitude into one demand per
//! axis for the mixer.
//!
//! Two interchangeable rate algorithms share the same contract:
//!
//! - [`rewrite::RewritePid`]: integer arithmetic with a Q19.13 integrator.
//! - [`float::FloatPid`]: single precision floats on top of `piddiy`.
//!
//! The algorithm is chosen from [`PidConfig::algorithm`] and can be swapped
//! at runtime with [`AngleRateController::set_algorithm`], which starts the
//! new algorithm from a clean state.
//!
//! Per axis weights come from throttle PID attenuation ([`tpa`]) and scale
//! the P and D terms.

pub mod filter;
pub mod float;
pub mod level;
pub mod rewrite;
pub mod tpa;

use crate::axis::Axis;
use crate::config::{Config, PidConfig, PidGains};
use crate::rc::RcCommand;
use crate::Number;
use float::FloatPid;
use level::{angle_error, desired_rate, LevelDemand};
use rewrite::RewritePid;

/// Symmetric bound on the I term.
pub const PID_MAX_I: i32 = 256;
/// Symmetric bound on the D term.
pub const PID_MAX_D: i32 = 512;
/// Samples in the D term moving average.
pub const DTERM_AVERAGE_COUNT: usize = 4;

/// Rate algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PidAlgorithm {
    /// Integer algorithm.
    #[default]
    Rewrite,
    /// Floating point algorithm.
    Float,
}

/// Everything a rate algorithm needs for one axis and one iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisInput<T> {
    /// Rate setpoint.
    pub desired_rate: T,
    /// Raw gyro reading. Four counts per rate unit.
    pub gyro_adc: i16,
    /// Gains after axis scaling.
    pub gains: PidGains,
    /// Attenuation weight in percent.
    pub weight: u8,
    /// Air mode is active.
    pub airmode: bool,
    /// The integrator must not grow past its remembered limit.
    pub anti_windup: bool,
    /// Symmetric limit on the P term, yaw on 4+ motor airframes only.
    pub p_limit: Option<u16>,
    /// Measured loop period.
    pub dt_us: u32,
}

/// P, I and D of one axis in actuator units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisTerms {
    /// Proportional term.
    pub p: i32,
    /// Integral term.
    pub i: i32,
    /// Derivative term.
    pub d: i32,
}

impl AxisTerms {
    /// Sum of the three terms.
    pub fn sum(&self) -> i32 {
        self.p + self.i + self.d
    }
}

/// A rate loop implementation.
pub trait RateAlgorithm {
    /// Number type the setpoint is computed in.
    type Value: Number;

    /// Runs one axis for one iteration.
    fn update_axis(&mut self, axis: Axis, input: &AxisInput<Self::Value>) -> AxisTerms;

    /// Clears every rate integrator.
    fn reset_integrators(&mut self);
}

/// Controller demand of all axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidOutput {
    /// Demand per axis, P + I + D.
    pub axis: [i16; 3],
    /// Terms per axis.
    pub terms: [AxisTerms; 3],
}

impl PidOutput {
    /// Demand of one axis.
    pub fn demand(&self, axis: Axis) -> i16 {
        self.axis[axis.index()]
    }
}

/// Per iteration controller inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlInput {
    /// Shaped stick command.
    pub command: RcCommand,
    /// Raw gyro readings, roll, pitch, yaw.
    pub gyro_adc: [i16; 3],
    /// Measured roll and pitch in decidegrees.
    pub attitude_dd: [i16; 2],
    /// Roll and pitch trim in decidegrees.
    pub trim_dd: [i16; 2],
    /// Self level blend percent. 100 is angle mode, 0 is rate mode.
    pub level_percent: u8,
    /// Air mode is active.
    pub airmode: bool,
    /// The craft requests integrator protection.
    pub anti_windup: bool,
    /// The mixer clipped a motor on the previous iteration.
    pub motor_limit_reached: bool,
    /// Motors on the airframe.
    pub motor_count: u8,
}

enum RateLoop {
    Rewrite(RewritePid),
    Float(FloatPid),
}

impl RateLoop {
    fn new(algorithm: PidAlgorithm, config: &PidConfig) -> Self {
        match algorithm {
            PidAlgorithm::Rewrite => Self::Rewrite(RewritePid::new(config)),
            PidAlgorithm::Float => Self::Float(FloatPid::new(config)),
        }
    }
}

/// Shared per axis parameters, before the setpoint is known.
#[derive(Clone, Copy)]
struct AxisParams {
    rate: u8,
    command: i16,
    level: LevelDemand,
    gyro_adc: i16,
    gains: PidGains,
    weight: u8,
    airmode: bool,
    anti_windup: bool,
    p_limit: Option<u16>,
    dt_us: u32,
}

fn run_axis<A: RateAlgorithm>(algorithm: &mut A, axis: Axis, params: AxisParams) -> AxisTerms {
    let input = AxisInput {
        desired_rate: desired_rate::<A::Value>(axis, params.rate, params.command, params.level),
        gyro_adc: params.gyro_adc,
        gains: params.gains,
        weight: params.weight,
        airmode: params.airmode,
        anti_windup: params.anti_windup,
        p_limit: params.p_limit,
        dt_us: params.dt_us,
    };
    algorithm.update_axis(axis, &input)
}

/// Angle and rate controller with a selectable rate algorithm.
pub struct AngleRateController {
    config: PidConfig,
    rates: [u8; 3],
    algorithm: PidAlgorithm,
    rate_loop: RateLoop,
    weights: [u8; 3],
    scales: [u8; 3],
    output: PidOutput,
}

impl AngleRateController {
    /// Builds the controller from a validated configuration.
    pub fn new(config: &Config) -> Self {
        let algorithm = config.pid.algorithm;
        Self {
            config: config.pid,
            rates: config.rates.rates,
            algorithm,
            rate_loop: RateLoop::new(algorithm, &config.pid),
            weights: [100; 3],
            scales: [100; 3],
            output: PidOutput::default(),
        }
    }

    /// Active algorithm.
    pub fn algorithm(&self) -> PidAlgorithm {
        self.algorithm
    }

    /// Switches algorithm. The new one starts with empty integrators and
    /// filters.
    pub fn set_algorithm(&mut self, algorithm: PidAlgorithm) {
        if algorithm != self.algorithm {
            log_info!("pid algorithm switched");
            self.algorithm = algorithm;
            self.rate_loop = RateLoop::new(algorithm, &self.config);
        }
    }

    /// Replaces the per axis extra rates.
    pub fn set_rates(&mut self, rates: [u8; 3]) {
        self.rates = rates;
    }

    /// Sets the attenuation weights, usually from [`tpa::axis_weights`].
    pub fn set_weights(&mut self, weights: [u8; 3]) {
        self.weights = weights;
    }

    /// Current attenuation weights.
    pub fn weights(&self) -> [u8; 3] {
        self.weights
    }

    /// Scales the P, I and D gains of one axis by `percent`.
    pub fn set_axis_scale(&mut self, axis: Axis, percent: u8) {
        self.scales[axis.index()] = percent;
    }

    fn scaled_gains(&self, axis: Axis) -> PidGains {
        let scale = u16::from(self.scales[axis.index()]);
        let gains = self.config.axis(axis);
        let scaled = |gain: u8| (u16::from(gain) * scale / 100).min(u16::from(u8::MAX)) as u8;
        PidGains::new(scaled(gains.p), scaled(gains.i), scaled(gains.d))
    }

    /// Clears the rate loop integrators.
    pub fn reset_rate_integrators(&mut self) {
        match &mut self.rate_loop {
            RateLoop::Rewrite(pid) => pid.reset_integrators(),
            RateLoop::Float(pid) => pid.reset_integrators(),
        }
    }

    /// Runs all axes for one iteration.
    pub fn update(&mut self, input: &ControlInput, dt_us: u32) -> PidOutput {
        let mut output = PidOutput::default();
        for axis in Axis::ALL {
            let index = axis.index();
            let command = input.command.axis(axis);

            let level = if axis != Axis::Yaw && input.level_percent > 0 {
                let error_dd = angle_error(
                    command,
                    input.attitude_dd[index],
                    input.trim_dd[index],
                    self.config.max_angle_inclination,
                );
                LevelDemand {
                    percent: input.level_percent,
                    error_dd,
                    p: self.config.level.p,
                }
            } else {
                LevelDemand::default()
            };

            let params = AxisParams {
                rate: self.rates[index],
                command,
                level,
                gyro_adc: input.gyro_adc[index],
                gains: self.scaled_gains(axis),
                weight: self.weights[index],
                airmode: input.airmode,
                anti_windup: (input.anti_windup || input.motor_limit_reached)
                    && !(axis == Axis::Yaw && self.config.yaw_full_weight),
                p_limit: (axis == Axis::Yaw && input.motor_count >= 4).then_some(self.config.yaw_p_limit),
                dt_us,
            };

            let terms = match &mut self.rate_loop {
                RateLoop::Rewrite(pid) => run_axis(pid, axis, params),
                RateLoop::Float(pid) => run_axis(pid, axis, params),
            };
            output.terms[index] = terms;
            output.axis[index] = terms.sum().clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }
        self.output = output;
        output
    }

    /// Output of the last iteration.
    pub fn output(&self) -> &PidOutput {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(algorithm: PidAlgorithm) -> AngleRateController {
        let mut config = Config::default();
        config.pid.algorithm = algorithm;
        config.pid.looptime_us = 2048;
        AngleRateController::new(&config)
    }

    fn quad_input() -> ControlInput {
        ControlInput {
            motor_count: 4,
            ..ControlInput::default()
        }
    }

    /// Test that zero error gives zero output for both algorithms.
    #[test]
    fn test_controller_zero_error_is_idle() {
        for algorithm in [PidAlgorithm::Rewrite, PidAlgorithm::Float] {
            let mut pid = controller(algorithm);
            for _ in 0..10 {
                let output = pid.update(&quad_input(), 2048);
                assert_eq!(PidOutput::default(), output, "No error means no demand.");
            }
        }
    }

    /// Test that both algorithms agree on the sign and rough size of the
    /// demand.
    #[test]
    fn test_controller_algorithms_agree() {
        let mut input = quad_input();
        input.gyro_adc = [-800, 800, 0];

        let rewrite = controller(PidAlgorithm::Rewrite).update(&input, 2048);
        let float = controller(PidAlgorithm::Float).update(&input, 2048);

        for axis in [Axis::Roll, Axis::Pitch] {
            let r = rewrite.terms[axis.index()].p;
            let f = float.terms[axis.index()].p;
            assert!((r - f).abs() <= 1, "P terms should agree, {} vs {}.", r, f);
        }
        assert!(rewrite.demand(Axis::Roll) > 0, "Negative roll rate is corrected.");
        assert!(float.demand(Axis::Pitch) < 0, "Positive pitch rate is corrected.");
    }

    /// Test that switching algorithm clears accumulated state.
    #[test]
    fn test_controller_switch_algorithm() {
        let mut pid = controller(PidAlgorithm::Rewrite);
        let mut input = quad_input();
        input.gyro_adc = [-4000, 0, 0];
        for _ in 0..50 {
            pid.update(&input, 2048);
        }
        assert!(pid.output().terms[0].i > 0, "Integrator should build up.");

        pid.set_algorithm(PidAlgorithm::Float);
        assert_eq!(PidAlgorithm::Float, pid.algorithm(), "Algorithm should switch.");
        let output = pid.update(&quad_input(), 2048);
        assert_eq!(0, output.terms[0].i, "Float starts from an empty integrator.");
    }

    /// Test integrator reset.
    #[test]
    fn test_controller_reset_rate_integrators() {
        let mut pid = controller(PidAlgorithm::Rewrite);
        let mut input = quad_input();
        input.gyro_adc = [-4000, -4000, -4000];
        for _ in 0..50 {
            pid.update(&input, 2048);
        }
        pid.reset_rate_integrators();
        let output = pid.update(&quad_input(), 2048);
        assert_eq!([0, 0, 0], output.terms.map(|t| t.i), "Integrators should be cleared.");
    }

    /// Test that angle mode drives the craft back to level.
    #[test]
    fn test_controller_angle_mode() {
        let mut pid = controller(PidAlgorithm::Rewrite);
        let mut input = quad_input();
        input.level_percent = 100;
        input.attitude_dd = [100, -100];
        let output = pid.update(&input, 2048);
        assert!(output.demand(Axis::Roll) < 0, "Right roll is levelled with a left demand.");
        assert!(output.demand(Axis::Pitch) > 0, "Nose down is levelled with a nose up demand.");
        assert_eq!(0, output.demand(Axis::Yaw), "Yaw does not level.");
    }

    /// Test that a steady angle error gives a steady angle loop demand.
    #[test]
    fn test_controller_angle_mode_steady_error() {
        for algorithm in [PidAlgorithm::Rewrite, PidAlgorithm::Float] {
            let mut pid = controller(algorithm);
            let mut input = quad_input();
            input.level_percent = 100;
            input.attitude_dd = [100, 0];
            let first = pid.update(&input, 2048).terms[0];
            assert!(first.p < 0, "Right roll is levelled with a left demand.");
            for _ in 0..200 {
                let terms = pid.update(&input, 2048).terms[0];
                assert_eq!(first.p, terms.p, "P term holds under a steady error.");
                assert_eq!(0, terms.d, "No D term without a changing rate.");
            }
        }
    }

    /// Test that the yaw full weight flag only frees the yaw integrator
    /// from the air mode clamp.
    #[test]
    fn test_controller_yaw_full_weight_skips_windup_clamp() {
        let mut idle = quad_input();
        idle.airmode = true;
        let mut saturated = idle;
        saturated.anti_windup = true;
        saturated.gyro_adc = [-4000, 0, -4000];

        for (yaw_full_weight, yaw_grows) in [(false, false), (true, true)] {
            let mut config = Config::default();
            config.pid.yaw_full_weight = yaw_full_weight;
            let mut pid = AngleRateController::new(&config);
            pid.update(&idle, 3500);
            let mut output = PidOutput::default();
            for _ in 0..50 {
                output = pid.update(&saturated, 3500);
            }
            assert_eq!(0, output.terms[0].i, "Roll stays at the remembered limit.");
            assert_eq!(yaw_grows, output.terms[2].i > 0, "Yaw integrator follows the flag.");
        }
    }

    /// Test the yaw P limit on a quad and its absence on a tricopter.
    #[test]
    fn test_controller_yaw_p_limit() {
        let mut config = Config::default();
        config.pid.yaw_p_limit = 100;
        config.pid.yaw = PidGains::new(200, 0, 0);
        let mut pid = AngleRateController::new(&config);
        let mut input = quad_input();
        input.gyro_adc = [0, 0, -20_000];
        let output = pid.update(&input, 3500);
        assert_eq!(100, output.terms[2].p, "Yaw P is limited on a quad.");

        let mut pid = AngleRateController::new(&config);
        input.motor_count = 3;
        let output = pid.update(&input, 3500);
        assert!(output.terms[2].p > 100, "Yaw P is not limited on a tricopter.");
    }

    /// Test axis scaling and attenuation weights.
    #[test]
    fn test_controller_scale_and_weight() {
        let mut input = quad_input();
        input.gyro_adc = [-1280, 0, 0];

        let mut pid = controller(PidAlgorithm::Rewrite);
        let full = pid.update(&input, 2048).terms[0].p;

        let mut pid = controller(PidAlgorithm::Rewrite);
        pid.set_axis_scale(Axis::Roll, 50);
        let scaled = pid.update(&input, 2048).terms[0].p;

        let mut pid = controller(PidAlgorithm::Rewrite);
        pid.set_weights([50, 100, 100]);
        let weighted = pid.update(&input, 2048).terms[0].p;

        assert_eq!(100, full, "Full P term.");
        assert_eq!(50, scaled, "Half gain halves P.");
        assert_eq!(50, weighted, "Half weight halves P.");
    }
}
