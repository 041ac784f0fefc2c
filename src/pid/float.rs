// src/pid/float.rs

//! # Floating Point Rate Algorithm
//!
//! Each axis runs a `piddiy` controller with unit gains whose compute
//! callback returns the already scaled P, I and D terms. The integral term
//! therefore lives in `PidController::integral` between iterations.
//!
//! Gains keep the integer tuning scale and are converted with fixed factors
//! so that both algorithms respond alike to the same configuration.

use super::filter::DeltaFilter;
use super::{AxisInput, AxisTerms, RateAlgorithm, DTERM_AVERAGE_COUNT, PID_MAX_D, PID_MAX_I};
use crate::axis::Axis;
use crate::config::PidConfig;
use crate::Number;
use piddiy::PidController;

/// Scale from P8 to the float P gain.
pub const P_TERM_SCALE: f32 = 1.0 / 128.0;
/// Scale from I8 to the float I gain.
pub const I_TERM_SCALE: f32 = 1_000_000.0 / 16_777_216.0;
/// Scale from D8 to the float D gain.
pub const D_TERM_SCALE: f32 = (0.000_001 * 65_535.0) / 512.0;

/// Control data for the float rate compute callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FloatRateData {
    /// Rate error, setpoint minus measured rate.
    pub error: f32,
    /// Filtered negative rate change per second.
    pub delta_rate: f32,
    /// The time delta since the last computation, in seconds.
    pub dt: f32,
    /// P gain including weight and scale.
    pub p_gain: f32,
    /// I gain including scale.
    pub i_gain: f32,
    /// D gain including weight and scale.
    pub d_gain: f32,
    /// Anti-windup bound on the integral, when active.
    pub windup_limit: Option<f32>,
}

/// Float rate compute callback. Returns the P, I and D terms.
pub fn compute_float_rate(pid: &mut PidController<f32, FloatRateData>, data: FloatRateData) -> (f32, f32, f32) {
    let max_i = PID_MAX_I as f32;
    let max_d = PID_MAX_D as f32;

    let proportional = data.error * data.p_gain;
    let mut integral = (pid.integral + data.error * data.dt * data.i_gain).clamp_to(-max_i, max_i);
    if let Some(limit) = data.windup_limit {
        integral = integral.clamp_to(-limit, limit);
    }
    let derivative = (data.delta_rate * data.d_gain).clamp_to(-max_d, max_d);

    (proportional, integral, derivative)
}

struct AxisState {
    pid: PidController<f32, FloatRateData>,
    windup_limit: f32,
    last_gyro: f32,
    delta_filter: DeltaFilter<f32, DTERM_AVERAGE_COUNT>,
    terms: (f32, f32, f32),
}

impl AxisState {
    fn new(config: &PidConfig) -> Self {
        let mut pid = PidController::new();
        pid.compute_fn(compute_float_rate)
            .set_point(0.0)
            .kp(1.0)
            .ki(1.0)
            .kd(1.0);
        Self {
            pid,
            windup_limit: 0.0,
            last_gyro: 0.0,
            delta_filter: DeltaFilter::new(config.dterm_cut_hz, config.looptime_us),
            terms: (0.0, 0.0, 0.0),
        }
    }
}

/// Floating point rate loop.
pub struct FloatPid {
    axes: [AxisState; 3],
}

impl FloatPid {
    /// Creates the loop with the configured D filter.
    pub fn new(config: &PidConfig) -> Self {
        Self {
            axes: core::array::from_fn(|_| AxisState::new(config)),
        }
    }

    /// Unrounded P, I and D of the last iteration of an axis.
    pub fn terms(&self, axis: Axis) -> (f32, f32, f32) {
        self.axes[axis.index()].terms
    }
}

impl RateAlgorithm for FloatPid {
    type Value = f32;

    fn update_axis(&mut self, axis: Axis, input: &AxisInput<f32>) -> AxisTerms {
        let state = &mut self.axes[axis.index()];
        let dt = input.dt_us.max(1) as f32 * 1e-6;

        let gyro_rate = f32::from(input.gyro_adc) / 4.0;
        let error = input.desired_rate - gyro_rate;
        let weight = f32::from(input.weight) / 100.0;

        let delta = (state.last_gyro - gyro_rate) / dt;
        state.last_gyro = gyro_rate;
        let delta_rate = if input.gains.d == 0 {
            0.0
        } else {
            state.delta_filter.apply(delta)
        };

        let data = FloatRateData {
            error,
            delta_rate,
            dt,
            p_gain: f32::from(input.gains.p) * weight * P_TERM_SCALE,
            i_gain: f32::from(input.gains.i) * I_TERM_SCALE,
            d_gain: f32::from(input.gains.d) * weight * D_TERM_SCALE,
            windup_limit: (input.airmode && input.anti_windup).then_some(state.windup_limit),
        };
        let (proportional, _, derivative) = compute_float_rate(&mut state.pid, data);
        let _ = state.pid.compute(data);
        let integral = state.pid.integral;
        if input.airmode && !input.anti_windup {
            state.windup_limit = libm::fabsf(integral);
        }

        let mut p = proportional;
        if let Some(limit) = input.p_limit {
            let limit = f32::from(limit);
            p = p.clamp_to(-limit, limit);
        }
        state.terms = (p, integral, derivative);

        AxisTerms {
            p: libm::rintf(p) as i32,
            i: libm::rintf(integral) as i32,
            d: libm::rintf(derivative) as i32,
        }
    }

    fn reset_integrators(&mut self) {
        for state in self.axes.iter_mut() {
            state.pid.integral = 0.0;
            state.windup_limit = 0.0;
        }
    }
}
