// src/rc/sticks.rs

//! Stick position classification used by arming and the mixer.

use crate::axis::Axis;
use crate::config::RxConfig;
use crate::rc::RcChannels;

/// Half width of the band around centre in which a stick counts as idle.
pub const STICK_IDLE_DEADBAND: u16 = 12;

/// Whether the throttle stick is at its low end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThrottleStatus {
    /// Below `min_check`, or inside the 3D deadband.
    Low,
    /// Anywhere else.
    High,
}

/// Classifies the throttle stick.
///
/// With bidirectional motors the low zone is the band around `mid_rc`.
pub fn throttle_status(throttle: u16, rx: &RxConfig, feature_3d: bool) -> ThrottleStatus {
    let low = if feature_3d {
        throttle.abs_diff(rx.mid_rc) < rx.deadband_3d_throttle
    } else {
        throttle < rx.min_check
    };
    if low {
        ThrottleStatus::Low
    } else {
        ThrottleStatus::High
    }
}

/// Stick gestures recognised on one receiver frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StickKeys {
    /// Throttle low with the arming stick at its high end.
    pub arm_combo: bool,
    /// Throttle low with the arming stick at its low end.
    pub disarm_combo: bool,
    /// Throttle low with roll, pitch and yaw centred.
    pub idle: bool,
    /// Roll, pitch and yaw centred, regardless of throttle.
    pub centered: bool,
    /// Throttle is low.
    pub throttle_low: bool,
}

/// Reads the stick gestures from a frame.
///
/// `retarded_arm` moves the arming gesture from yaw to roll.
pub fn stick_keys(channels: &RcChannels, rx: &RxConfig, retarded_arm: bool, feature_3d: bool) -> StickKeys {
    let throttle_low = throttle_status(channels.throttle(), rx, feature_3d) == ThrottleStatus::Low;
    let arm_axis = if retarded_arm { Axis::Roll } else { Axis::Yaw };
    let arm_stick = channels.stick(arm_axis);

    let centered = Axis::ALL
        .iter()
        .all(|&axis| channels.stick(axis).abs_diff(rx.mid_rc) <= STICK_IDLE_DEADBAND);

    StickKeys {
        arm_combo: throttle_low && arm_stick > rx.max_check,
        disarm_combo: throttle_low && arm_stick < rx.min_check,
        idle: throttle_low && centered,
        centered,
        throttle_low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::channel;

    fn frame(roll: u16, pitch: u16, yaw: u16, throttle: u16) -> RcChannels {
        let mut channels = RcChannels::default();
        channels.pulses[channel::ROLL] = roll;
        channels.pulses[channel::PITCH] = pitch;
        channels.pulses[channel::YAW] = yaw;
        channels.pulses[channel::THROTTLE] = throttle;
        channels
    }

    /// Test the plain and the 3D throttle classification.
    #[test]
    fn test_throttle_status() {
        let rx = RxConfig::default();
        assert_eq!(ThrottleStatus::Low, throttle_status(1050, &rx, false), "Below min_check.");
        assert_eq!(ThrottleStatus::High, throttle_status(1100, &rx, false), "At min_check.");
        assert_eq!(ThrottleStatus::Low, throttle_status(1520, &rx, true), "Inside 3D band.");
        assert_eq!(ThrottleStatus::High, throttle_status(1050, &rx, true), "Reverse is not low in 3D.");
    }

    /// Test the yaw arming gestures.
    #[test]
    fn test_stick_keys_yaw_combo() {
        let rx = RxConfig::default();
        let keys = stick_keys(&frame(1500, 1500, 1950, 1000), &rx, false, false);
        assert!(keys.arm_combo, "Throttle low and yaw right arms.");
        assert!(!keys.disarm_combo, "Not a disarm gesture.");

        let keys = stick_keys(&frame(1500, 1500, 1050, 1000), &rx, false, false);
        assert!(keys.disarm_combo, "Throttle low and yaw left disarms.");

        let keys = stick_keys(&frame(1500, 1500, 1950, 1500), &rx, false, false);
        assert!(!keys.arm_combo, "Throttle up cancels the gesture.");
    }

    /// Test that retarded arming listens to roll.
    #[test]
    fn test_stick_keys_retarded_arm() {
        let rx = RxConfig::default();
        let keys = stick_keys(&frame(1950, 1500, 1500, 1000), &rx, true, false);
        assert!(keys.arm_combo, "Roll right arms.");
        let keys = stick_keys(&frame(1500, 1500, 1950, 1000), &rx, true, false);
        assert!(!keys.arm_combo, "Yaw is ignored.");
    }

    /// Test the idle detection band.
    #[test]
    fn test_stick_keys_idle() {
        let rx = RxConfig::default();
        let keys = stick_keys(&frame(1510, 1490, 1512, 1000), &rx, false, false);
        assert!(keys.idle, "Sticks within band are idle.");
        let keys = stick_keys(&frame(1513, 1500, 1500, 1000), &rx, false, false);
        assert!(!keys.idle, "Roll outside band is not idle.");
        assert!(!keys.centered, "Roll outside band is not centred.");
    }
}
