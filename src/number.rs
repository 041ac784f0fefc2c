// src/number.rs

//! Numeric bound shared by the generic filters and interpolation helpers.
//!
//! Both the integer and the floating point controller reuse the same
//! averaging and clamping code through this trait.

use num_traits::{Num, NumCast};

/// Custom trait to encapsulate base number requirements.
pub trait Number: Num + NumCast + Copy + PartialOrd {
    /// Clamps generic PartialOrd values within a given range.
    fn clamp_to(self, min: Self, max: Self) -> Self {
        if self < min {
            min
        } else if max < self {
            max
        } else {
            self
        }
    }

    /// Converts a count or index into this number type.
    fn from_usize(value: usize) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::zero)
    }

    /// Converts an integer demand into this number type.
    fn from_i32(value: i32) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::zero)
    }

    /// Converts a float into this number type, truncating toward zero for
    /// integers.
    fn from_f32(value: f32) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::zero)
    }

    /// Converts this number into a float.
    fn to_f32(self) -> f32 {
        num_traits::ToPrimitive::to_f32(&self).unwrap_or(0.0)
    }
}

impl<T: Num + NumCast + Copy + PartialOrd> Number for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    /// Test clamping of integers and floats through the shared trait.
    #[test]
    fn test_number_clamp() {
        assert_eq!(5, 9i32.clamp_to(-5, 5), "Integer should clamp high.");
        assert_eq!(-5, (-9i32).clamp_to(-5, 5), "Integer should clamp low.");
        assert!(
            value_close(0.5, 0.5f32.clamp_to(0.0, 1.0)),
            "Float inside range is unchanged."
        );
    }

    /// Test conversion of counts.
    #[test]
    fn test_number_from_usize() {
        assert_eq!(4, i32::from_usize(4), "Count should convert to i32.");
        assert!(
            value_close(4.0, f32::from_usize(4)),
            "Count should convert to f32."
        );
    }

    /// Test the float conversions used by the delta filters.
    #[test]
    fn test_number_float_conversion() {
        assert_eq!(-2, i32::from_f32(-2.7), "Integers truncate toward zero.");
        assert!(value_close(-2.7, f32::from_f32(-2.7)), "Floats pass through.");
        assert!(value_close(12.0, 12i32.to_f32()), "Integer to float.");
        assert_eq!(-40, i32::from_i32(-40), "Identity on i32.");
    }
}
