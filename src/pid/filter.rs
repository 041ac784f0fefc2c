// src/pid/filter.rs

//! # D Term Filters
//!
//! Noise reduction for the derivative path. A [`Biquad`] low-pass is used
//! when a cutoff frequency is configured, otherwise a short
//! [`MovingAverage`] smooths the raw gyro delta.

use crate::Number;
use core::f32::consts::{LN_2, PI};

/// Bandwidth of the biquad low-pass in octaves.
pub const BIQUAD_BANDWIDTH: f32 = 1.9;

/// Second order low-pass section.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Biquad {
    /// Designs a low-pass for `cutoff_hz` at a sample period of
    /// `sample_period_us`.
    pub fn low_pass(cutoff_hz: f32, sample_period_us: u32) -> Self {
        let sample_rate = 1_000_000.0 / sample_period_us.max(1) as f32;
        let omega = 2.0 * PI * cutoff_hz / sample_rate;
        let sn = libm::sinf(omega);
        let cs = libm::cosf(omega);
        let alpha = sn * libm::sinhf(LN_2 / 2.0 * BIQUAD_BANDWIDTH * omega / sn);

        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cs) / 2.0 / a0,
            b1: (1.0 - cs) / a0,
            b2: (1.0 - cs) / 2.0 / a0,
            a1: -2.0 * cs / a0,
            a2: (1.0 - alpha) / a0,
            ..Self::default()
        }
    }

    /// Filters one sample.
    pub fn apply(&mut self, sample: f32) -> f32 {
        let result = self.b0 * sample + self.b1 * self.x1 + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = sample;
        self.y2 = self.y1;
        self.y1 = result;
        result
    }

    /// Clears the sample history, keeping the coefficients.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

/// Fixed length moving average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage<T, const N: usize> {
    samples: [T; N],
    next: usize,
}

impl<T: Number, const N: usize> Default for MovingAverage<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Number, const N: usize> MovingAverage<T, N> {
    /// Creates an average primed with zeros.
    pub fn new() -> Self {
        Self {
            samples: [T::zero(); N],
            next: 0,
        }
    }

    /// Adds a sample and returns the mean of the last `N` samples.
    pub fn push(&mut self, sample: T) -> T {
        if N == 0 {
            return sample;
        }
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % N;
        let sum = self.samples.iter().fold(T::zero(), |acc, &s| acc + s);
        sum / T::from_usize(N)
    }

    /// Clears the history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Either filter, chosen once from the configured cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeltaFilter<T, const N: usize> {
    /// Moving average over `N` samples.
    Average(MovingAverage<T, N>),
    /// Biquad low-pass.
    LowPass(Biquad),
}

impl<T: Number, const N: usize> DeltaFilter<T, N> {
    /// Low-pass when `cutoff_hz` is non zero, moving average otherwise.
    pub fn new(cutoff_hz: u16, sample_period_us: u32) -> Self {
        if cutoff_hz > 0 {
            Self::LowPass(Biquad::low_pass(f32::from(cutoff_hz), sample_period_us))
        } else {
            Self::Average(MovingAverage::new())
        }
    }

    /// Filters one sample.
    pub fn apply(&mut self, sample: T) -> T {
        match self {
            Self::Average(average) => average.push(sample),
            Self::LowPass(biquad) => T::from_f32(biquad.apply(sample.to_f32())),
        }
    }

    /// Clears the history.
    pub fn reset(&mut self) {
        match self {
            Self::Average(average) => average.reset(),
            Self::LowPass(biquad) => biquad.reset(),
        }
    }
}
