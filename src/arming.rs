// src/arming.rs

//! # Arming State Machine
//!
//! Arming is an explicit state plus a pure transition function, [`step`],
//! evaluated once per receiver tick. Dwell timers are deadlines stored in
//! the state, compared with [`reached`] so they survive clock wrap.
//!
//! ```text
//! Disarmed --combo--> ArmPending --dwell--> Armed(Sticks)
//! Disarmed --switch-----------------------> Armed(Switch)
//! Armed --idle/combo/switch--> DisarmPending --dwell + safe--> Disarmed
//! ```
//!
//! Releasing the input during a pending state returns to the prior state.
//! A disarm is refused while any axis turns faster than
//! `disarm_rate_threshold_dps`; the dwell then starts over.

use crate::clock::{deadline_after, reached, MICROS_PER_MILLI, MICROS_PER_SECOND};

/// Arming timings and safety limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingConfig {
    /// Hold time of the arm stick combo.
    pub arm_dwell_ms: u16,
    /// Hold time of the disarm stick combo.
    pub disarm_dwell_ms: u16,
    /// Idle stick time before an automatic disarm, 0 disables it.
    pub auto_disarm_delay_s: u8,
    /// Largest body rate at which a disarm is accepted.
    pub disarm_rate_threshold_dps: u16,
    /// Arm with roll right instead of yaw right.
    pub retarded_arm: bool,
}

impl Default for ArmingConfig {
    fn default() -> Self {
        Self {
            arm_dwell_ms: 500,
            disarm_dwell_ms: 500,
            auto_disarm_delay_s: 5,
            disarm_rate_threshold_dps: 50,
            retarded_arm: false,
        }
    }
}

/// How the vehicle was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmMethod {
    /// Stick combo held for the arm dwell.
    Sticks,
    /// Arm switch.
    Switch,
}

/// What started a pending disarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisarmCause {
    /// Sticks left idle.
    Idle,
    /// Disarm stick combo.
    Combo,
    /// Arm switch released.
    Switch,
}

/// Arming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmingState {
    /// Motors off.
    #[default]
    Disarmed,
    /// Arm combo held, arms at `deadline`.
    ArmPending {
        /// Time the combo has been held long enough.
        deadline: u32,
    },
    /// Motors live.
    Armed {
        /// How the vehicle was armed.
        method: ArmMethod,
    },
    /// Disarm requested, disarms at `deadline` if still requested and safe.
    DisarmPending {
        /// What requested the disarm.
        cause: DisarmCause,
        /// Arm method to return to on abort.
        method: ArmMethod,
        /// Time the request has been held long enough.
        deadline: u32,
    },
}

impl ArmingState {
    /// Whether the motors are live.
    pub fn is_armed(self) -> bool {
        matches!(self, ArmingState::Armed { .. } | ArmingState::DisarmPending { .. })
    }
}

/// Debounced inputs of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArmingInputs {
    /// Arm stick combo pressed.
    pub arm_combo: bool,
    /// Disarm stick combo pressed.
    pub disarm_combo: bool,
    /// Sticks idle with throttle low.
    pub idle_sticks: bool,
    /// Arm switch position, `None` when no switch is assigned.
    pub arm_switch: Option<bool>,
    /// Pre-arm checks pass.
    pub prearm_ok: bool,
    /// Largest measured body rate magnitude, degrees per second.
    pub max_rate_dps: u16,
}

/// Event fed to [`step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmingEvent {
    /// Periodic evaluation of the inputs.
    Tick(ArmingInputs),
    /// Unconditional disarm, bypassing dwell and safety.
    ForceDisarm,
}

/// Side effect of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmingEffect {
    /// The vehicle armed; controller integrators must be reset.
    Armed,
    /// The vehicle disarmed.
    Disarmed,
    /// A disarm was due but the vehicle was still rotating.
    DisarmRefused,
    /// A disarm input was pressed while already disarmed.
    Chirp,
}

fn disarm_dwell_us(cause: DisarmCause, config: &ArmingConfig) -> u32 {
    match cause {
        DisarmCause::Idle => u32::from(config.auto_disarm_delay_s) * MICROS_PER_SECOND,
        DisarmCause::Combo => u32::from(config.disarm_dwell_ms) * MICROS_PER_MILLI,
        DisarmCause::Switch => 0,
    }
}

fn still_requested(cause: DisarmCause, inputs: &ArmingInputs) -> bool {
    match cause {
        DisarmCause::Idle => inputs.idle_sticks,
        DisarmCause::Combo => inputs.disarm_combo,
        DisarmCause::Switch => inputs.arm_switch != Some(true),
    }
}

/// Computes the next state and its side effect.
pub fn step(state: ArmingState, event: ArmingEvent, now: u32, config: &ArmingConfig) -> (ArmingState, Option<ArmingEffect>) {
    let inputs = match event {
        ArmingEvent::ForceDisarm => {
            let effect = state.is_armed().then_some(ArmingEffect::Disarmed);
            return (ArmingState::Disarmed, effect);
        }
        ArmingEvent::Tick(inputs) => inputs,
    };

    match state {
        ArmingState::Disarmed => {
            if inputs.prearm_ok && inputs.arm_switch == Some(true) {
                (ArmingState::Armed { method: ArmMethod::Switch }, Some(ArmingEffect::Armed))
            } else if inputs.prearm_ok && inputs.arm_combo {
                let deadline = deadline_after(now, u32::from(config.arm_dwell_ms) * MICROS_PER_MILLI);
                (ArmingState::ArmPending { deadline }, None)
            } else if inputs.disarm_combo {
                (ArmingState::Disarmed, Some(ArmingEffect::Chirp))
            } else {
                (ArmingState::Disarmed, None)
            }
        }

        ArmingState::ArmPending { deadline } => {
            if !inputs.arm_combo || !inputs.prearm_ok {
                (ArmingState::Disarmed, None)
            } else if reached(now, deadline) {
                (ArmingState::Armed { method: ArmMethod::Sticks }, Some(ArmingEffect::Armed))
            } else {
                (state, None)
            }
        }

        ArmingState::Armed { method } => {
            let cause = if method == ArmMethod::Switch && inputs.arm_switch == Some(false) {
                Some(DisarmCause::Switch)
            } else if inputs.disarm_combo {
                Some(DisarmCause::Combo)
            } else if inputs.idle_sticks && config.auto_disarm_delay_s > 0 {
                Some(DisarmCause::Idle)
            } else {
                None
            };
            match cause {
                // switch disarm has no dwell, evaluate it right away
                Some(DisarmCause::Switch) => step(
                    ArmingState::DisarmPending {
                        cause: DisarmCause::Switch,
                        method,
                        deadline: now,
                    },
                    event,
                    now,
                    config,
                ),
                Some(cause) => {
                    let deadline = deadline_after(now, disarm_dwell_us(cause, config));
                    (ArmingState::DisarmPending { cause, method, deadline }, None)
                }
                None => (state, None),
            }
        }

        ArmingState::DisarmPending { cause, method, deadline } => {
            if !still_requested(cause, &inputs) {
                (ArmingState::Armed { method }, None)
            } else if !reached(now, deadline) {
                (state, None)
            } else if inputs.max_rate_dps > config.disarm_rate_threshold_dps {
                let deadline = deadline_after(now, disarm_dwell_us(cause, config));
                (ArmingState::DisarmPending { cause, method, deadline }, Some(ArmingEffect::DisarmRefused))
            } else {
                (ArmingState::Disarmed, Some(ArmingEffect::Disarmed))
            }
        }
    }
}

/// Arming state holder with logging of every effect.
#[derive(Debug, Clone)]
pub struct Arming {
    config: ArmingConfig,
    state: ArmingState,
}

impl Arming {
    /// Starts disarmed.
    pub fn new(config: &ArmingConfig) -> Self {
        Self {
            config: *config,
            state: ArmingState::Disarmed,
        }
    }

    /// Current state.
    pub fn state(&self) -> ArmingState {
        self.state
    }

    /// Whether the motors are live.
    pub fn is_armed(&self) -> bool {
        self.state.is_armed()
    }

    /// Whether the vehicle was armed with the stick combo.
    pub fn armed_by_sticks(&self) -> bool {
        matches!(
            self.state,
            ArmingState::Armed { method: ArmMethod::Sticks } | ArmingState::DisarmPending { method: ArmMethod::Sticks, .. }
        )
    }

    /// Applies an event and returns its side effect.
    pub fn handle(&mut self, event: ArmingEvent, now: u32) -> Option<ArmingEffect> {
        let (state, effect) = step(self.state, event, now, &self.config);
        self.state = state;
        match effect {
            Some(ArmingEffect::Armed) => log_info!("arming: armed"),
            Some(ArmingEffect::Disarmed) => log_info!("arming: disarmed"),
            Some(ArmingEffect::DisarmRefused) => {
                if let ArmingEvent::Tick(inputs) = event {
                    log_warn!("arming: disarm refused at {} dps", inputs.max_rate_dps);
                }
            }
            Some(ArmingEffect::Chirp) | None => {}
        }
        effect
    }
}
