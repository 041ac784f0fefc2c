// src/pid/rewrite.rs

//! # Integer Rate Algorithm
//!
//! All arithmetic is integer. The integrator is kept in Q19.13 so that small
//! errors at short loop times still accumulate.
//!
//! - `P = (error * P8 * weight / 100) >> 7`
//! - `I += ((error * looptime) >> 11) * I8`, in units of 2^-13, bounded to
//!   `±PID_MAX_I`
//! - `D = (filtered_delta * D8 * weight / 100) >> 8`, bounded to
//!   `±PID_MAX_D`, where the gyro delta is first scaled by
//!   `0xFFFF / (looptime >> 4) >> 5`
//!
//! Gyro readings are divided by four before use.

use super::filter::DeltaFilter;
use super::{AxisInput, AxisTerms, RateAlgorithm, DTERM_AVERAGE_COUNT, PID_MAX_D, PID_MAX_I};
use crate::axis::Axis;
use crate::config::PidConfig;
use fixed::types::I19F13;

#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisState {
    integrator: I19F13,
    windup_limit: I19F13,
    last_gyro: i32,
    delta_filter: DeltaFilter<i32, DTERM_AVERAGE_COUNT>,
}

impl AxisState {
    fn new(config: &PidConfig) -> Self {
        Self {
            integrator: I19F13::ZERO,
            windup_limit: I19F13::ZERO,
            last_gyro: 0,
            delta_filter: DeltaFilter::new(config.dterm_cut_hz, config.looptime_us),
        }
    }
}

/// Integer rate loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewritePid {
    looptime_us: u32,
    axes: [AxisState; 3],
}

impl RewritePid {
    /// Creates the loop for the configured loop time and D filter.
    pub fn new(config: &PidConfig) -> Self {
        Self {
            looptime_us: config.looptime_us,
            axes: [AxisState::new(config); 3],
        }
    }

    /// Raw integrator of an axis.
    pub fn integrator(&self, axis: Axis) -> I19F13 {
        self.axes[axis.index()].integrator
    }

    fn delta_scale(&self) -> i32 {
        (0xFFFF / (self.looptime_us >> 4).max(1)) as i32
    }
}

impl RateAlgorithm for RewritePid {
    type Value = i32;

    fn update_axis(&mut self, axis: Axis, input: &AxisInput<i32>) -> AxisTerms {
        let delta_scale = self.delta_scale();
        let looptime = i64::from(self.looptime_us);
        let state = &mut self.axes[axis.index()];

        let gyro_rate = i32::from(input.gyro_adc) / 4;
        let error = input.desired_rate - gyro_rate;
        let weight = i32::from(input.weight);

        let mut p = (error * i32::from(input.gains.p) * weight / 100) >> 7;
        if let Some(limit) = input.p_limit {
            let limit = i32::from(limit);
            p = p.clamp(-limit, limit);
        }

        let step = ((i64::from(error) * looptime) >> 11) * i64::from(input.gains.i);
        let step = I19F13::from_bits(step.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);
        let max_i = I19F13::from_num(PID_MAX_I);
        state.integrator = state.integrator.saturating_add(step).clamp(-max_i, max_i);
        if input.airmode {
            if input.anti_windup {
                state.integrator = state.integrator.clamp(-state.windup_limit, state.windup_limit);
            } else {
                state.windup_limit = state.integrator.abs();
            }
        }
        let i = state.integrator.to_num::<i32>();

        let delta = state.last_gyro - gyro_rate;
        state.last_gyro = gyro_rate;
        let d = if input.gains.d == 0 {
            0
        } else {
            let delta = state.delta_filter.apply((delta * delta_scale) >> 5);
            ((delta * i32::from(input.gains.d) * weight / 100) >> 8).clamp(-PID_MAX_D, PID_MAX_D)
        };

        AxisTerms { p, i, d }
    }

    fn reset_integrators(&mut self) {
        for state in self.axes.iter_mut() {
            state.integrator = I19F13::ZERO;
            state.windup_limit = I19F13::ZERO;
        }
    }
}
