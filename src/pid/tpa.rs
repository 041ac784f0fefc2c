// src/pid/tpa.rs

//! Throttle PID attenuation.
//!
//! Above the breakpoint the controller weight falls linearly from 100 % to
//! `100 - dyn_thr_pid` % at full throttle.

use crate::config::{RateProfile, PULSE_MAX, PULSE_MIN};

/// Weight in percent for a throttle pulse.
pub fn attenuation(throttle: u16, breakpoint: u16, dyn_thr_pid: u8) -> u8 {
    let breakpoint = breakpoint.clamp(PULSE_MIN, PULSE_MAX);
    let dyn_thr_pid = u32::from(dyn_thr_pid.min(100));
    if dyn_thr_pid == 0 || throttle < breakpoint || breakpoint >= PULSE_MAX {
        return 100;
    }
    let throttle = u32::from(throttle.min(PULSE_MAX));
    let span = u32::from(PULSE_MAX - breakpoint);
    let reduction = dyn_thr_pid * (throttle - u32::from(breakpoint)) / span;
    (100 - reduction) as u8
}

/// Per axis weights. Every axis attenuates alike.
pub fn axis_weights(throttle: u16, profile: &RateProfile) -> [u8; 3] {
    [attenuation(throttle, profile.tpa_breakpoint, profile.dyn_thr_pid); 3]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test full weight below the breakpoint.
    #[test]
    fn test_tpa_below_breakpoint() {
        assert_eq!(100, attenuation(1400, 1500, 50), "Below breakpoint.");
        assert_eq!(100, attenuation(1500, 1500, 50), "At breakpoint.");
    }

    /// Test the linear fall above the breakpoint.
    #[test]
    fn test_tpa_linear() {
        assert_eq!(75, attenuation(1750, 1500, 50), "Half way loses half.");
        assert_eq!(50, attenuation(2000, 1500, 50), "Full throttle.");
        assert_eq!(50, attenuation(2100, 1500, 50), "Beyond full throttle.");
    }

    /// Test that out of range parameters are clamped.
    #[test]
    fn test_tpa_clamps_parameters() {
        assert_eq!(0, attenuation(2000, 500, 200), "Breakpoint and percent are clamped.");
        assert_eq!(100, attenuation(2000, 2500, 50), "Breakpoint at the top disables attenuation.");
    }

    /// Test that yaw attenuates with roll and pitch.
    #[test]
    fn test_tpa_axis_weights() {
        let profile = RateProfile {
            dyn_thr_pid: 40,
            tpa_breakpoint: 1000,
            ..RateProfile::default()
        };
        assert_eq!([60, 60, 60], axis_weights(2000, &profile), "All axes attenuate.");
        assert_eq!([100, 100, 100], axis_weights(1000, &profile), "Full weight at the breakpoint.");
    }
}
