// src/test_utils.rs

//! This module contains utilities for testing.

/// A constant defining the tolerance within which floating-point values
/// are considered close enough to be equal.
pub const TEST_TOLERANCE: f32 = 1e-5;

/// Checks if two floating point numbers are close enough to be considered
/// equal.
///
/// # Arguments
/// * `target` - The target value.
/// * `value` - The value to compare against the target.
///
/// # Returns
/// `true` if the absolute difference between `target` and `value` is less than
/// `TEST_TOLERANCE`, otherwise `false`.
pub fn value_close(target: f32, value: f32) -> bool {
    libm::fabsf(target - value) < TEST_TOLERANCE
}

/// Checks if two floating point numbers agree to a relative tolerance.
///
/// Larger controller terms lose absolute precision, so they are compared
/// relative to their magnitude.
pub fn value_close_relative(target: f32, value: f32) -> bool {
    let scale = libm::fmaxf(1.0, libm::fabsf(target));
    libm::fabsf(target - value) < TEST_TOLERANCE * scale
}

/// Checks if each component of a per-axis triple is close enough to be
/// considered equal.
pub fn axes_close(target: [f32; 3], value: [f32; 3]) -> bool {
    target
        .iter()
        .zip(value.iter())
        .all(|(&t, &v)| value_close_relative(t, v))
}
