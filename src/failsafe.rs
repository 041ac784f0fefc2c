// src/failsafe.rs

//! # Failsafe
//!
//! Reacts to a lost receiver link while armed. The procedure runs through a
//! fixed sequence of phases:
//!
//! ```text
//! Idle -> SignalLostDetected -> Landing -> Landed -> MonitoringRecovery -> Recovered -> Idle
//! ```
//!
//! - With the throttle held low for the throttle-low delay before the loss,
//!   the vehicle is assumed to be on the ground and goes straight to
//!   `Landed` with a short recovery window.
//! - A configured kill switch lands immediately when its switch is on.
//! - [`FailsafeProcedure::AutoLanding`] holds a level attitude at the
//!   failsafe throttle for the off delay, then lands.
//!   [`FailsafeProcedure::Drop`] lands at once.
//! - `Landed` disarms and blocks re-arming until the link has been
//!   continuously good for the recovery window.
//!
//! The link itself is tracked by [`link::LinkMonitor`].

pub mod link;

use crate::clock::{deadline_after, reached, MICROS_PER_SECOND};
use link::TENTH_SECOND_US;

/// Recovery window after the kill switch.
pub const RECOVERY_KILL_SWITCH_US: u32 = MICROS_PER_SECOND;
/// Recovery window after a drop or a throttle-low landing.
pub const RECOVERY_SHORT_US: u32 = 3 * MICROS_PER_SECOND;
/// Recovery window after an auto landing.
pub const RECOVERY_LANDING_US: u32 = 30 * MICROS_PER_SECOND;

/// Bound on the phase transitions processed in one update.
const MAX_TRANSITIONS: usize = 8;

/// What to do once the signal is lost in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailsafeProcedure {
    /// Level out and descend at the failsafe throttle, then land.
    #[default]
    AutoLanding,
    /// Stop the motors.
    Drop,
}

/// Failsafe settings. Delays are in tenths of a second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailsafeConfig {
    /// Extra time before an invalid link is declared down.
    pub delay: u8,
    /// Length of the auto landing.
    pub off_delay: u8,
    /// Throttle pulse held during the auto landing.
    pub throttle: u16,
    /// Whether the failsafe switch acts as a kill switch.
    pub kill_switch: bool,
    /// How long the throttle must be low before a loss counts as landed.
    pub throttle_low_delay: u16,
    /// Procedure on signal loss.
    pub procedure: FailsafeProcedure,
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            delay: 10,
            off_delay: 200,
            throttle: 1000,
            kill_switch: false,
            throttle_low_delay: 100,
            procedure: FailsafeProcedure::AutoLanding,
        }
    }
}

impl FailsafeConfig {
    fn off_delay_us(&self) -> u32 {
        u32::from(self.off_delay) * TENTH_SECOND_US
    }

    fn throttle_low_delay_us(&self) -> u32 {
        u32::from(self.throttle_low_delay) * TENTH_SECOND_US
    }
}

/// Phase of the failsafe procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailsafePhase {
    /// Watching the link.
    #[default]
    Idle,
    /// Link lost while armed.
    SignalLostDetected,
    /// Forced descent in progress.
    Landing {
        /// End of the descent.
        until: u32,
    },
    /// Vehicle considered on the ground.
    Landed,
    /// Waiting for the link to stay good.
    MonitoringRecovery {
        /// Earliest recovery time.
        until: u32,
    },
    /// Link recovered, returning to idle.
    Recovered,
}

impl FailsafePhase {
    /// Short name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SignalLostDetected => "signal lost",
            Self::Landing { .. } => "landing",
            Self::Landed => "landed",
            Self::MonitoringRecovery { .. } => "monitoring recovery",
            Self::Recovered => "recovered",
        }
    }
}

/// Per-update view of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailsafeInputs {
    /// Vehicle armed.
    pub armed: bool,
    /// Receiver link healthy.
    pub link_up: bool,
    /// Throttle stick below min check.
    pub throttle_low: bool,
    /// Failsafe switch on.
    pub failsafe_switch: bool,
    /// Arming is switch based and the switch is on. Blocks recovery so the
    /// vehicle cannot re-arm on its own.
    pub arm_switch_on: bool,
}

/// Attitude and throttle imposed during the auto landing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ForcedControl {
    /// Throttle pulse to hold.
    pub throttle: u16,
    /// Whether to self-level.
    pub level: bool,
}

/// Result of one failsafe update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailsafeOutput {
    /// The procedure is running.
    pub active: bool,
    /// Arming must be refused.
    pub prevent_arming: bool,
    /// Control override while landing.
    pub forced: Option<ForcedControl>,
    /// The vehicle must be disarmed now.
    pub disarm: bool,
}

/// Failsafe state machine.
#[derive(Debug, Clone)]
pub struct Failsafe {
    config: FailsafeConfig,
    phase: FailsafePhase,
    monitoring: bool,
    active: bool,
    prevent_arming: bool,
    throttle_low_until: Option<u32>,
    recovery_window_us: u32,
    events: u16,
}

impl Failsafe {
    /// Creates an idle, unmonitored failsafe.
    pub fn new(config: &FailsafeConfig) -> Self {
        Self {
            config: *config,
            phase: FailsafePhase::Idle,
            monitoring: false,
            active: false,
            prevent_arming: false,
            throttle_low_until: None,
            recovery_window_us: RECOVERY_SHORT_US,
            events: 0,
        }
    }

    /// Starts reacting to link loss.
    pub fn start_monitoring(&mut self) {
        if !self.monitoring {
            log_info!("failsafe: monitoring");
        }
        self.monitoring = true;
    }

    /// Whether monitoring has started.
    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// Current phase.
    pub fn phase(&self) -> FailsafePhase {
        self.phase
    }

    /// Whether the procedure is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether arming must be refused.
    pub fn prevents_arming(&self) -> bool {
        self.prevent_arming
    }

    /// Number of times the procedure was activated.
    pub fn events(&self) -> u16 {
        self.events
    }

    fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.events = self.events.saturating_add(1);
        log_warn!("failsafe: activated");
    }

    fn enter(&mut self, phase: FailsafePhase) {
        log_info!("failsafe: {} -> {}", self.phase.name(), phase.name());
        self.phase = phase;
    }

    fn throttle_low_expired(&self, now: u32) -> bool {
        self.throttle_low_until
            .map_or(true, |deadline| reached(now, deadline))
    }

    /// Advances the procedure. Runs every phase change the inputs allow in
    /// one call.
    pub fn update(&mut self, inputs: &FailsafeInputs, now: u32) -> FailsafeOutput {
        let mut output = FailsafeOutput::default();
        if !self.monitoring {
            return output;
        }

        for _ in 0..MAX_TRANSITIONS {
            let next = match self.phase {
                FailsafePhase::Idle => {
                    if !inputs.armed {
                        self.throttle_low_until = None;
                        None
                    } else {
                        if !inputs.throttle_low {
                            self.throttle_low_until =
                                Some(deadline_after(now, self.config.throttle_low_delay_us()));
                        }
                        if self.config.kill_switch && inputs.failsafe_switch {
                            self.activate();
                            self.recovery_window_us = RECOVERY_KILL_SWITCH_US;
                            Some(FailsafePhase::Landed)
                        } else if !inputs.link_up {
                            if self.throttle_low_expired(now) {
                                self.activate();
                                self.recovery_window_us = RECOVERY_SHORT_US;
                                Some(FailsafePhase::Landed)
                            } else {
                                Some(FailsafePhase::SignalLostDetected)
                            }
                        } else {
                            None
                        }
                    }
                }
                FailsafePhase::SignalLostDetected => {
                    if inputs.link_up {
                        Some(FailsafePhase::Recovered)
                    } else {
                        self.activate();
                        match self.config.procedure {
                            FailsafeProcedure::AutoLanding => Some(FailsafePhase::Landing {
                                until: deadline_after(now, self.config.off_delay_us()),
                            }),
                            FailsafeProcedure::Drop => {
                                self.recovery_window_us = RECOVERY_SHORT_US;
                                Some(FailsafePhase::Landed)
                            }
                        }
                    }
                }
                FailsafePhase::Landing { until } => {
                    if inputs.link_up {
                        Some(FailsafePhase::Recovered)
                    } else if reached(now, until) || !inputs.armed {
                        self.recovery_window_us = RECOVERY_LANDING_US;
                        Some(FailsafePhase::Landed)
                    } else {
                        output.forced = Some(ForcedControl {
                            throttle: self.config.throttle,
                            level: true,
                        });
                        None
                    }
                }
                FailsafePhase::Landed => {
                    self.prevent_arming = true;
                    output.disarm = inputs.armed;
                    Some(FailsafePhase::MonitoringRecovery {
                        until: deadline_after(now, self.recovery_window_us),
                    })
                }
                FailsafePhase::MonitoringRecovery { until } => {
                    if !inputs.link_up {
                        self.phase = FailsafePhase::MonitoringRecovery {
                            until: deadline_after(now, self.recovery_window_us),
                        };
                        None
                    } else if reached(now, until) && !inputs.arm_switch_on {
                        self.prevent_arming = false;
                        Some(FailsafePhase::Recovered)
                    } else {
                        None
                    }
                }
                FailsafePhase::Recovered => {
                    self.throttle_low_until =
                        Some(deadline_after(now, self.config.throttle_low_delay_us()));
                    self.active = false;
                    Some(FailsafePhase::Idle)
                }
            };

            match next {
                Some(phase) => self.enter(phase),
                None => break,
            }
        }

        output.active = self.active;
        output.prevent_arming = self.prevent_arming;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARMED_LINK_UP: FailsafeInputs = FailsafeInputs {
        armed: true,
        link_up: true,
        throttle_low: false,
        failsafe_switch: false,
        arm_switch_on: false,
    };

    const ARMED_LINK_DOWN: FailsafeInputs = FailsafeInputs {
        link_up: false,
        ..ARMED_LINK_UP
    };

    fn monitored(config: FailsafeConfig) -> Failsafe {
        let mut failsafe = Failsafe::new(&config);
        failsafe.start_monitoring();
        failsafe
    }

    /// Test that nothing happens before monitoring starts.
    #[test]
    fn test_failsafe_not_monitoring() {
        let mut failsafe = Failsafe::new(&FailsafeConfig::default());
        let output = failsafe.update(&ARMED_LINK_DOWN, 1_000);
        assert_eq!(FailsafeOutput::default(), output, "Unmonitored failsafe is inert.");
        assert_eq!(FailsafePhase::Idle, failsafe.phase(), "Phase stays idle.");
    }

    /// Test that a healthy link keeps the failsafe idle.
    #[test]
    fn test_failsafe_idle_with_link() {
        let mut failsafe = monitored(FailsafeConfig::default());
        let output = failsafe.update(&ARMED_LINK_UP, 1_000);
        assert!(!output.active, "Not active.");
        assert_eq!(FailsafePhase::Idle, failsafe.phase(), "Still idle.");
    }

    /// Test the auto landing through to landed.
    #[test]
    fn test_failsafe_auto_landing() {
        let mut failsafe = monitored(FailsafeConfig::default());
        failsafe.update(&ARMED_LINK_UP, 1_000);

        let output = failsafe.update(&ARMED_LINK_DOWN, 2_000);
        assert!(output.active, "Active on signal loss.");
        assert_eq!(
            Some(ForcedControl { throttle: 1000, level: true }),
            output.forced,
            "Landing forces level and failsafe throttle."
        );
        assert_eq!(
            FailsafePhase::Landing { until: 2_000 + 20 * MICROS_PER_SECOND },
            failsafe.phase(),
            "Landing for the off delay."
        );

        let output = failsafe.update(&ARMED_LINK_DOWN, 2_000 + 10 * MICROS_PER_SECOND);
        assert!(output.forced.is_some(), "Still landing.");
        assert!(!output.disarm, "No disarm yet.");

        let end = 2_000 + 20 * MICROS_PER_SECOND;
        let output = failsafe.update(&ARMED_LINK_DOWN, end);
        assert!(output.disarm, "Landed disarms.");
        assert!(output.prevent_arming, "Landed blocks arming.");
        assert_eq!(
            FailsafePhase::MonitoringRecovery { until: end + RECOVERY_LANDING_US },
            failsafe.phase(),
            "Long recovery window after landing."
        );
    }

    /// Test the drop procedure.
    #[test]
    fn test_failsafe_drop() {
        let mut failsafe = monitored(FailsafeConfig {
            procedure: FailsafeProcedure::Drop,
            ..FailsafeConfig::default()
        });
        failsafe.update(&ARMED_LINK_UP, 1_000);
        let output = failsafe.update(&ARMED_LINK_DOWN, 2_000);
        assert!(output.disarm, "Drop disarms at once.");
        assert!(output.forced.is_none(), "No forced control.");
        assert_eq!(
            FailsafePhase::MonitoringRecovery { until: 2_000 + RECOVERY_SHORT_US },
            failsafe.phase(),
            "Short recovery window after drop."
        );
    }

    /// Test the kill switch.
    #[test]
    fn test_failsafe_kill_switch() {
        let mut failsafe = monitored(FailsafeConfig {
            kill_switch: true,
            ..FailsafeConfig::default()
        });
        let inputs = FailsafeInputs {
            failsafe_switch: true,
            ..ARMED_LINK_UP
        };
        let output = failsafe.update(&inputs, 5_000);
        assert!(output.active, "Kill switch activates.");
        assert!(output.disarm, "Kill switch disarms.");
        assert_eq!(
            FailsafePhase::MonitoringRecovery { until: 5_000 + RECOVERY_KILL_SWITCH_US },
            failsafe.phase(),
            "One second recovery window."
        );
    }

    /// Test that a loss after a long low throttle skips the landing.
    #[test]
    fn test_failsafe_throttle_low_skip() {
        let mut failsafe = monitored(FailsafeConfig::default());
        failsafe.update(&ARMED_LINK_UP, 0);
        let low = FailsafeInputs {
            throttle_low: true,
            ..ARMED_LINK_UP
        };
        failsafe.update(&low, 5 * MICROS_PER_SECOND);

        let lost = FailsafeInputs {
            throttle_low: true,
            ..ARMED_LINK_DOWN
        };
        let now = 10 * MICROS_PER_SECOND;
        let output = failsafe.update(&lost, now);
        assert!(output.disarm, "Treated as already landed.");
        assert_eq!(
            FailsafePhase::MonitoringRecovery { until: now + RECOVERY_SHORT_US },
            failsafe.phase(),
            "Short recovery window."
        );
    }

    /// Test that recovery needs the link good for the whole window.
    #[test]
    fn test_failsafe_recovery_window() {
        let mut failsafe = monitored(FailsafeConfig {
            procedure: FailsafeProcedure::Drop,
            ..FailsafeConfig::default()
        });
        failsafe.update(&ARMED_LINK_UP, 1_000);
        failsafe.update(&ARMED_LINK_DOWN, 2_000);

        let disarmed_up = FailsafeInputs {
            armed: false,
            ..ARMED_LINK_UP
        };
        let disarmed_down = FailsafeInputs {
            armed: false,
            ..ARMED_LINK_DOWN
        };

        let output = failsafe.update(&disarmed_up, 1_000_000);
        assert!(output.prevent_arming, "Window not yet elapsed.");

        failsafe.update(&disarmed_down, 2_500_000);
        let output = failsafe.update(&disarmed_up, 3_500_000);
        assert!(output.prevent_arming, "Dropout restarted the window.");

        let arm_switch_on = FailsafeInputs {
            arm_switch_on: true,
            ..disarmed_up
        };
        let output = failsafe.update(&arm_switch_on, 5_600_000);
        assert!(output.prevent_arming, "Arm switch on blocks recovery.");

        let output = failsafe.update(&disarmed_up, 5_600_000);
        assert!(!output.prevent_arming, "Recovered.");
        assert!(!output.active, "No longer active.");
        assert_eq!(FailsafePhase::Idle, failsafe.phase(), "Back to idle.");
    }

    /// Test that a link returning during the landing recovers.
    #[test]
    fn test_failsafe_link_returns_while_landing() {
        let mut failsafe = monitored(FailsafeConfig::default());
        failsafe.update(&ARMED_LINK_UP, 1_000);
        failsafe.update(&ARMED_LINK_DOWN, 2_000);
        let output = failsafe.update(&ARMED_LINK_UP, 3_000);
        assert!(!output.active, "Recovered mid landing.");
        assert!(output.forced.is_none(), "No forced control.");
        assert!(!output.prevent_arming, "Arming allowed.");
        assert_eq!(1, failsafe.events(), "One activation counted.");
    }

    /// Test that re-entering signal loss while active counts once.
    #[test]
    fn test_failsafe_reentry_counts_once() {
        let mut failsafe = monitored(FailsafeConfig::default());
        failsafe.update(&ARMED_LINK_UP, 1_000);
        failsafe.update(&ARMED_LINK_DOWN, 2_000);
        assert!(failsafe.is_active(), "Landing is active.");
        assert_eq!(1, failsafe.events(), "First activation counted.");

        failsafe.phase = FailsafePhase::SignalLostDetected;
        let output = failsafe.update(&ARMED_LINK_DOWN, 3_000);
        assert!(output.active, "Still active.");
        assert!(
            matches!(failsafe.phase(), FailsafePhase::Landing { .. }),
            "Back to landing."
        );
        assert_eq!(1, failsafe.events(), "Re-entry is not a new activation.");
    }
}
