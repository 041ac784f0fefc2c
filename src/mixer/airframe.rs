// src/mixer/airframe.rs

//! # Airframe Presets
//!
//! Each preset is a motor table, one row of throttle/roll/pitch/yaw factors
//! in percent per motor, plus a list of servo rules. [`Airframe::rules`]
//! expands both into the flat [`MixerRule`] table the mixer runs.
//!
//! Servo indices count from zero in output order for the airframe, so a
//! flying wing drives servos 0 and 1 and a tricopter drives servo 0.

use super::{MixerInput, MixerRule, OutputTarget, MAX_RULES};
use heapless::Vec;

/// Supported vehicle layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Airframe {
    /// Quad in X configuration.
    #[default]
    QuadX,
    /// Quad in plus configuration.
    QuadP,
    /// Y4 with coaxial rear pair.
    Y4,
    /// Quad with V tail.
    Vtail4,
    /// Quad with A tail.
    Atail4,
    /// Hexacopter in X configuration.
    Hex6X,
    /// Hexacopter in plus configuration.
    Hex6P,
    /// Hexacopter in H configuration.
    Hex6H,
    /// Coaxial Y6.
    Y6,
    /// Coaxial X8.
    OctoX8,
    /// Flat octocopter in X configuration.
    OctoFlatX,
    /// Flat octocopter in plus configuration.
    OctoFlatP,
    /// Tricopter with yaw servo.
    Tricopter,
    /// Two motors on tilting servos.
    Bicopter,
    /// Two coaxial motors with two control servos.
    Dualcopter,
    /// Single motor with four vanes.
    Singlecopter,
    /// Elevon wing.
    FlyingWing,
    /// Conventional airplane.
    Airplane,
    /// Camera gimbal only.
    Gimbal,
    /// Quad X with one tilt servo.
    QuadXTilt1,
    /// Quad X with two tilt servos.
    QuadXTilt2,
    /// Rules taken from the configuration.
    Custom,
}

type MotorRow = [i16; 4];
type ServoRule = (u8, MixerInput, i16);

const QUAD_X: &[MotorRow] = &[
    [100, -100, 100, -100],
    [100, -100, -100, 100],
    [100, 100, 100, 100],
    [100, 100, -100, -100],
];

const QUAD_P: &[MotorRow] = &[
    [100, 0, 100, -100],
    [100, -100, 0, 100],
    [100, 100, 0, 100],
    [100, 0, -100, -100],
];

const VTAIL4: &[MotorRow] = &[
    [100, -58, 58, 100],
    [100, -46, -39, -50],
    [100, 58, 58, -100],
    [100, 46, -39, 50],
];

const ATAIL4: &[MotorRow] = &[
    [100, -58, 58, -100],
    [100, -46, -39, 50],
    [100, 58, 58, 100],
    [100, 46, -39, -50],
];

const Y4: &[MotorRow] = &[
    [100, 0, 100, -100],
    [100, -100, -100, 0],
    [100, 0, 100, 100],
    [100, 100, -100, 0],
];

const Y6: &[MotorRow] = &[
    [100, 0, 133, 100],
    [100, -100, -67, -100],
    [100, 100, -67, -100],
    [100, 0, 133, -100],
    [100, -100, -67, 100],
    [100, 100, -67, 100],
];

const HEX6H: &[MotorRow] = &[
    [100, -100, 100, -100],
    [100, -100, -100, 100],
    [100, 100, 100, 100],
    [100, 100, -100, -100],
    [100, 0, 0, 0],
    [100, 0, 0, 0],
];

const HEX6P: &[MotorRow] = &[
    [100, -87, 50, 100],
    [100, -87, -50, -100],
    [100, 87, 50, 100],
    [100, 87, -50, -100],
    [100, 0, -100, 100],
    [100, 0, 100, -100],
];

const HEX6X: &[MotorRow] = &[
    [100, -50, 87, 100],
    [100, -50, -87, 100],
    [100, 50, 87, -100],
    [100, 50, -87, -100],
    [100, -100, 0, -100],
    [100, 100, 0, 100],
];

const OCTO_X8: &[MotorRow] = &[
    [100, -100, 100, -100],
    [100, -100, -100, 100],
    [100, 100, 100, 100],
    [100, 100, -100, -100],
    [100, -100, 100, 100],
    [100, -100, -100, -100],
    [100, 100, 100, -100],
    [100, 100, -100, 100],
];

const OCTO_FLAT_P: &[MotorRow] = &[
    [100, 71, -71, 100],
    [100, -71, -71, 100],
    [100, -71, 71, 100],
    [100, 71, 71, 100],
    [100, 0, -100, -100],
    [100, -100, 0, -100],
    [100, 0, 100, -100],
    [100, 100, 0, -100],
];

const OCTO_FLAT_X: &[MotorRow] = &[
    [100, 100, -41, 100],
    [100, -41, -100, 100],
    [100, -100, 41, 100],
    [100, 41, 100, 100],
    [100, 41, -100, -100],
    [100, -100, -41, -100],
    [100, -41, 100, -100],
    [100, 100, 41, -100],
];

const SINGLE_PROP: &[MotorRow] = &[[100, 0, 0, 0]];

const DUALCOPTER: &[MotorRow] = &[[100, 0, 0, -100], [100, 0, 0, 100]];

const BICOPTER: &[MotorRow] = &[[100, 100, 0, 0], [100, -100, 0, 0]];

const TRICOPTER: &[MotorRow] = &[[100, 0, 133, 0], [100, -100, -67, 0], [100, 100, -67, 0]];

const SERVO_TRI: &[ServoRule] = &[(0, MixerInput::Yaw, 100)];

const SERVO_BI: &[ServoRule] = &[
    (0, MixerInput::Yaw, 100),
    (0, MixerInput::Pitch, 100),
    (1, MixerInput::Yaw, 100),
    (1, MixerInput::Pitch, 100),
];

const SERVO_DUAL: &[ServoRule] = &[(0, MixerInput::Pitch, 100), (1, MixerInput::Roll, 100)];

const SERVO_SINGLE: &[ServoRule] = &[
    (0, MixerInput::Yaw, 100),
    (0, MixerInput::Pitch, 100),
    (1, MixerInput::Yaw, 100),
    (1, MixerInput::Pitch, 100),
    (2, MixerInput::Yaw, 100),
    (2, MixerInput::Roll, 100),
    (3, MixerInput::Yaw, 100),
    (3, MixerInput::Roll, 100),
];

const SERVO_FLYING_WING: &[ServoRule] = &[
    (0, MixerInput::Roll, 100),
    (0, MixerInput::Pitch, 100),
    (1, MixerInput::Roll, -100),
    (1, MixerInput::Pitch, 100),
    (2, MixerInput::Throttle, 100),
];

const SERVO_AIRPLANE: &[ServoRule] = &[
    (0, MixerInput::Roll, 100),
    (1, MixerInput::Roll, 100),
    (2, MixerInput::Yaw, 100),
    (3, MixerInput::Pitch, 100),
    (4, MixerInput::Throttle, 100),
];

const SERVO_GIMBAL: &[ServoRule] = &[(0, MixerInput::GimbalPitch, 125), (1, MixerInput::GimbalRoll, 125)];

const SERVO_TILT1: &[ServoRule] = &[(0, MixerInput::RcAux1, 100)];

const SERVO_TILT2: &[ServoRule] = &[(0, MixerInput::RcAux1, 100), (1, MixerInput::RcAux1, 100)];

impl Airframe {
    /// Fixed wing airframes fly without motor based stabilisation.
    pub fn is_fixed_wing(self) -> bool {
        matches!(self, Airframe::FlyingWing | Airframe::Airplane)
    }

    /// Tricopters keep a live yaw servo.
    pub fn is_tricopter(self) -> bool {
        self == Airframe::Tricopter
    }

    /// Airframes whose motors tilt under a servo.
    pub fn is_tilt_rotor(self) -> bool {
        matches!(self, Airframe::QuadXTilt1 | Airframe::QuadXTilt2)
    }

    fn tables(self) -> (&'static [MotorRow], &'static [ServoRule]) {
        match self {
            Airframe::QuadX => (QUAD_X, &[]),
            Airframe::QuadP => (QUAD_P, &[]),
            Airframe::Y4 => (Y4, &[]),
            Airframe::Vtail4 => (VTAIL4, &[]),
            Airframe::Atail4 => (ATAIL4, &[]),
            Airframe::Hex6X => (HEX6X, &[]),
            Airframe::Hex6P => (HEX6P, &[]),
            Airframe::Hex6H => (HEX6H, &[]),
            Airframe::Y6 => (Y6, &[]),
            Airframe::OctoX8 => (OCTO_X8, &[]),
            Airframe::OctoFlatX => (OCTO_FLAT_X, &[]),
            Airframe::OctoFlatP => (OCTO_FLAT_P, &[]),
            Airframe::Tricopter => (TRICOPTER, SERVO_TRI),
            Airframe::Bicopter => (BICOPTER, SERVO_BI),
            Airframe::Dualcopter => (DUALCOPTER, SERVO_DUAL),
            Airframe::Singlecopter => (SINGLE_PROP, SERVO_SINGLE),
            Airframe::FlyingWing => (SINGLE_PROP, SERVO_FLYING_WING),
            Airframe::Airplane => (SINGLE_PROP, SERVO_AIRPLANE),
            Airframe::Gimbal => (&[], SERVO_GIMBAL),
            Airframe::QuadXTilt1 => (QUAD_X, SERVO_TILT1),
            Airframe::QuadXTilt2 => (QUAD_X, SERVO_TILT2),
            Airframe::Custom => (&[], &[]),
        }
    }

    /// Rule table of the preset. [`Airframe::Custom`] yields an empty table;
    /// its rules come from the configuration.
    pub fn rules(self) -> Vec<MixerRule, MAX_RULES> {
        const MOTOR_INPUTS: [MixerInput; 4] = [MixerInput::Throttle, MixerInput::Roll, MixerInput::Pitch, MixerInput::Yaw];

        let (motors, servos) = self.tables();
        let mut rules = Vec::new();
        for (motor, row) in motors.iter().enumerate() {
            for (input, rate) in MOTOR_INPUTS.iter().zip(row) {
                if *rate != 0 {
                    // presets never exceed 8 motors * 4 + 8 servo rules
                    let _ = rules.push(MixerRule::new(OutputTarget::Motor(motor as u8), *input, *rate));
                }
            }
        }
        for &(servo, input, rate) in servos {
            let _ = rules.push(MixerRule::new(OutputTarget::Servo(servo), input, rate));
        }
        rules
    }
}
