// src/axis.rs

//! Flight axes shared by the RC shaper, the controller and the mixer.

/// A rotational flight axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// Rotation about the longitudinal axis.
    Roll = 0,
    /// Rotation about the lateral axis.
    Pitch = 1,
    /// Rotation about the vertical axis.
    Yaw = 2,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// Index of the axis into per-axis arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}
