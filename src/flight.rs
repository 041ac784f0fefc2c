// src/flight.rs

//! # Flight Core
//!
//! Composition root. [`FlightCore`] owns every component and a
//! [`Scheduler`] running two tasks over the shared [`FlightState`]:
//!
//! - `control` (realtime, one control period): shape the sticks, apply
//!   throttle PID attenuation, pick the self level blend, run the
//!   controller, run the mixer and write the actuators, in that order;
//! - `rx` (high, on every receiver frame or after one frame interval of
//!   silence): link bookkeeping, stick gestures, the arming step and the
//!   failsafe update.
//!
//! The output path for the next control iteration is chosen at the end of
//! every `rx` run:
//!
//! | armed | failsafe forcing control | path             |
//! |-------|--------------------------|------------------|
//! | no    | any                      | `Disarmed`       |
//! | yes   | yes                      | `FailsafeForced` |
//! | yes   | no                       | `Normal`         |
//!
//! Hardware is reached only through [`Actuators`] and [`Clock`]. An
//! actuator write failure is a [`FatalFault`] handed to the host's fault
//! hook, which never returns.

use crate::arming::{Arming, ArmingEffect, ArmingEvent, ArmingInputs, ArmingState};
use crate::clock::{deadline_after, elapsed, reached, Clock, MICROS_PER_SECOND};
use crate::config::{Config, MotorConfig, RxConfig, PULSE_MID};
use crate::error::{FatalFault, InitError, OutputError};
use crate::failsafe::link::LinkMonitor;
use crate::failsafe::{Failsafe, FailsafeInputs, FailsafePhase, ForcedControl};
use crate::mixer::{Mixer, MixerFrame, MixerInput, MixerOutputs, OutputPath, INPUT_COUNT};
use crate::pid::level::{horizon_strength, LEVEL_FULL};
use crate::pid::{tpa, AngleRateController, ControlInput};
use crate::rc::sticks::stick_keys;
use crate::rc::{channel, RcChannels, RcShaper, ShapeContext};
use crate::scheduler::{Priority, Scheduler, TaskDescriptor, TaskId};

/// Name of the control task.
pub const CONTROL_TASK: &str = "control";
/// Name of the receiver task.
pub const RX_TASK: &str = "rx";
/// Receiver frame interval. The receiver task runs at least this often.
pub const RX_PERIOD_US: u32 = 20_000;
/// Time after boot before the failsafe starts watching the link.
pub const FAILSAFE_STARTUP_DELAY_US: u32 = 5 * MICROS_PER_SECOND;
/// Gyro counts per degree per second, times ten.
pub const GYRO_COUNTS_PER_DPS_X10: u32 = 164;
/// Attitude in decidegrees that maps to a full gimbal input.
pub const GIMBAL_FULL_SCALE_DD: i32 = 1800;

/// Motor and servo output drivers.
pub trait Actuators {
    /// Writes one motor pulse.
    fn write_motor(&mut self, index: usize, pulse: u16) -> Result<(), OutputError>;
    /// Writes one servo pulse.
    fn write_servo(&mut self, index: usize, pulse: u16) -> Result<(), OutputError>;
}

/// Flight modes and switches, as decoded by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlightModes {
    /// Full self levelling.
    pub level: bool,
    /// Self levelling that fades out with stick deflection.
    pub horizon: bool,
    /// Keep full authority at zero throttle.
    pub airmode: bool,
    /// Arm switch position, `None` when arming is stick based.
    pub arm_switch: Option<bool>,
    /// Failsafe switch position.
    pub failsafe_switch: bool,
    /// Switch bits for conditional mixer rules.
    pub switches: u32,
}

/// Latest inertial measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttitudeSnapshot {
    /// Raw gyro readings, roll, pitch, yaw.
    pub gyro_adc: [i16; 3],
    /// Measured roll and pitch in decidegrees.
    pub attitude_dd: [i16; 2],
}

/// Everything the scheduled tasks share.
pub struct FlightState<A> {
    actuators: A,
    rx: RxConfig,
    motors: MotorConfig,
    feature_3d: bool,
    retarded_arm: bool,
    horizon_sensitivity: u8,
    looptime_us: u32,
    shaper: RcShaper,
    controller: AngleRateController,
    mixer: Mixer,
    arming: Arming,
    failsafe: Failsafe,
    link: LinkMonitor,
    channels: RcChannels,
    frame_valid: bool,
    frame_at: u32,
    new_frame: bool,
    command_fresh: bool,
    attitude: AttitudeSnapshot,
    trim_dd: [i16; 2],
    modes: FlightModes,
    path: OutputPath,
    forced: Option<ForcedControl>,
    monitoring_at: u32,
    last_control_at: Option<u32>,
}

impl<A: Actuators> FlightState<A> {
    fn new(config: &Config, actuators: A, boot_at: u32) -> Self {
        Self {
            actuators,
            rx: config.rx,
            motors: config.motors,
            feature_3d: config.mixer.feature_3d,
            retarded_arm: config.arming.retarded_arm,
            horizon_sensitivity: config.pid.level.d,
            looptime_us: config.pid.looptime_us,
            shaper: RcShaper::new(config),
            controller: AngleRateController::new(config),
            mixer: Mixer::new(config),
            arming: Arming::new(&config.arming),
            failsafe: Failsafe::new(&config.failsafe),
            link: LinkMonitor::new(config.failsafe.delay),
            channels: RcChannels::default(),
            frame_valid: false,
            frame_at: boot_at,
            new_frame: false,
            command_fresh: false,
            attitude: AttitudeSnapshot::default(),
            trim_dd: [0; 2],
            modes: FlightModes::default(),
            path: OutputPath::Disarmed,
            forced: None,
            monitoring_at: deadline_after(boot_at, FAILSAFE_STARTUP_DELAY_US),
            last_control_at: None,
        }
    }

    fn max_rate_dps(&self) -> u16 {
        let counts = self
            .attitude
            .gyro_adc
            .iter()
            .map(|adc| u32::from(adc.unsigned_abs()))
            .max()
            .unwrap_or(0);
        (counts * 10 / GYRO_COUNTS_PER_DPS_X10) as u16
    }

    /// Throttle mixer input: the shaped throttle spread over the armed
    /// motor range, relative to the centre pulse.
    fn throttle_input(&self, throttle: i16) -> i16 {
        let min = i32::from(self.motors.minthrottle);
        let span = i32::from(self.motors.maxthrottle) - min;
        (min + i32::from(throttle) * span / 1000 - i32::from(PULSE_MID)) as i16
    }

    fn mixer_inputs(&self, axis: [i16; 3], throttle: i16) -> [i16; INPUT_COUNT] {
        let mid = self.rx.mid_rc;
        let centered = |index: usize| self.channels.centered(index, mid).clamp(-500, 500) as i16;
        let gimbal = |dd: i16| (i32::from(dd) * 500 / GIMBAL_FULL_SCALE_DD).clamp(-500, 500) as i16;

        let mut inputs = [0i16; INPUT_COUNT];
        inputs[MixerInput::Roll.index()] = axis[0];
        inputs[MixerInput::Pitch.index()] = axis[1];
        inputs[MixerInput::Yaw.index()] = axis[2];
        inputs[MixerInput::Throttle.index()] = throttle;
        inputs[MixerInput::RcRoll.index()] = centered(channel::ROLL);
        inputs[MixerInput::RcPitch.index()] = centered(channel::PITCH);
        inputs[MixerInput::RcYaw.index()] = centered(channel::YAW);
        inputs[MixerInput::RcThrottle.index()] = centered(channel::THROTTLE);
        inputs[MixerInput::RcAux1.index()] = centered(channel::AUX1);
        inputs[MixerInput::RcAux2.index()] = centered(channel::AUX1 + 1);
        inputs[MixerInput::RcAux3.index()] = centered(channel::AUX1 + 2);
        inputs[MixerInput::RcAux4.index()] = centered(channel::AUX1 + 3);
        inputs[MixerInput::GimbalPitch.index()] = gimbal(self.attitude.attitude_dd[1]);
        inputs[MixerInput::GimbalRoll.index()] = gimbal(self.attitude.attitude_dd[0]);
        inputs
    }

    fn write_outputs(&mut self) -> Result<(), FatalFault> {
        let fault = |source| FatalFault::Output {
            task: CONTROL_TASK,
            source,
        };
        let outputs = self.mixer.outputs();
        for (index, &pulse) in outputs.motors.iter().enumerate() {
            self.actuators.write_motor(index, pulse).map_err(fault)?;
        }
        for (index, &pulse) in outputs.servos.iter().enumerate() {
            self.actuators.write_servo(index, pulse).map_err(fault)?;
        }
        Ok(())
    }
}

fn select_path(armed: bool, forced: Option<ForcedControl>) -> OutputPath {
    match (armed, forced) {
        (false, _) => OutputPath::Disarmed,
        (true, Some(_)) => OutputPath::FailsafeForced,
        (true, None) => OutputPath::Normal,
    }
}

fn run_control<A: Actuators>(state: &mut FlightState<A>, now: u32) -> Result<(), FatalFault> {
    let dt_us = state
        .last_control_at
        .map_or(state.looptime_us, |last| elapsed(now, last));
    state.last_control_at = Some(now);

    let context = ShapeContext {
        fresh: core::mem::take(&mut state.command_fresh),
        dt_us,
        armed_by_sticks: state.arming.armed_by_sticks(),
    };
    let mut command = state.shaper.shape(&state.channels, context);

    let forced = match state.path {
        OutputPath::FailsafeForced => state.forced,
        _ => None,
    };
    let throttle_pulse = match forced {
        Some(control) => {
            command.roll = 0;
            command.pitch = 0;
            command.yaw = 0;
            control.throttle
        }
        None => state.channels.throttle(),
    };

    let weights = tpa::axis_weights(throttle_pulse, state.shaper.rate_profile());
    state.controller.set_weights(weights);

    let level_percent = if forced.is_some_and(|control| control.level) || state.modes.level {
        LEVEL_FULL
    } else if state.modes.horizon {
        horizon_strength(command.roll, command.pitch, state.horizon_sensitivity)
    } else {
        0
    };

    let keys = stick_keys(&state.channels, &state.rx, state.retarded_arm, state.feature_3d);
    if state.path == OutputPath::Disarmed {
        state.controller.reset_rate_integrators();
    } else if keys.throttle_low && !state.modes.airmode {
        state.controller.reset_rate_integrators();
    }

    let input = ControlInput {
        command,
        gyro_adc: state.attitude.gyro_adc,
        attitude_dd: state.attitude.attitude_dd,
        trim_dd: state.trim_dd,
        level_percent,
        airmode: state.modes.airmode,
        anti_windup: state.modes.airmode && keys.throttle_low,
        motor_limit_reached: state.mixer.motor_limit_reached(),
        motor_count: state.mixer.motor_count() as u8,
    };
    let output = state.controller.update(&input, dt_us);

    let throttle = match forced {
        Some(control) => (i32::from(control.throttle) - i32::from(PULSE_MID)) as i16,
        None => state.throttle_input(command.throttle),
    };
    let inputs = state.mixer_inputs(output.axis, throttle);
    state.mixer.set_inputs(inputs);
    let frame = MixerFrame {
        path: state.path,
        airmode: state.modes.airmode,
        throttle_pulse,
        yaw_command: command.yaw,
        body_pitch_dd: state.attitude.attitude_dd[1],
        switches: state.modes.switches,
    };
    state.mixer.update(&frame);
    state.write_outputs()
}

fn rx_ready<A>(state: &FlightState<A>, since_last_run: u32) -> bool {
    state.new_frame || since_last_run >= RX_PERIOD_US
}

fn run_rx<A: Actuators>(state: &mut FlightState<A>, now: u32) -> Result<(), FatalFault> {
    let fresh = core::mem::take(&mut state.new_frame);
    if fresh && state.frame_valid {
        state.link.on_valid(state.frame_at);
        state.command_fresh = true;
    } else {
        state.link.on_invalid(now);
    }
    if !state.failsafe.is_monitoring() && reached(now, state.monitoring_at) {
        state.failsafe.start_monitoring();
    }
    let link_up = state.link.is_up();

    let keys = stick_keys(&state.channels, &state.rx, state.retarded_arm, state.feature_3d);
    let inputs = ArmingInputs {
        arm_combo: link_up && keys.arm_combo,
        disarm_combo: link_up && keys.disarm_combo,
        idle_sticks: link_up && keys.idle,
        arm_switch: state.modes.arm_switch,
        prearm_ok: link_up && !state.failsafe.prevents_arming(),
        max_rate_dps: state.max_rate_dps(),
    };
    if state.arming.handle(ArmingEvent::Tick(inputs), now) == Some(ArmingEffect::Armed) {
        state.controller.reset_rate_integrators();
    }

    let output = state.failsafe.update(
        &FailsafeInputs {
            armed: state.arming.is_armed(),
            link_up,
            throttle_low: keys.throttle_low,
            failsafe_switch: state.modes.failsafe_switch,
            arm_switch_on: state.modes.arm_switch == Some(true),
        },
        now,
    );
    if output.disarm {
        state.arming.handle(ArmingEvent::ForceDisarm, now);
    }
    state.forced = output.forced;
    state.path = select_path(state.arming.is_armed(), state.forced);
    Ok(())
}

/// The flight-control core bound to its hardware.
pub struct FlightCore<A, K> {
    scheduler: Scheduler<FlightState<A>>,
    state: FlightState<A>,
    clock: K,
    fault_hook: fn(FatalFault) -> !,
    control_task: TaskId,
    rx_task: TaskId,
}

impl<A: Actuators, K: Clock> FlightCore<A, K> {
    /// Validates the configuration and builds the task table.
    pub fn new(config: &Config, actuators: A, clock: K, fault_hook: fn(FatalFault) -> !) -> Result<Self, InitError> {
        config.validate()?;
        let state = FlightState::new(config, actuators, clock.now_us());

        let mut scheduler = Scheduler::new();
        let control_task = scheduler.register_enabled(TaskDescriptor::periodic(
            CONTROL_TASK,
            run_control::<A>,
            config.pid.looptime_us,
            Priority::Realtime,
        ))?;
        let rx_task = scheduler.register_enabled(TaskDescriptor::event(
            RX_TASK,
            rx_ready::<A>,
            run_rx::<A>,
            RX_PERIOD_US,
            Priority::High,
        ))?;
        log_info!("flight core ready, loop {} us", config.pid.looptime_us);

        Ok(Self {
            scheduler,
            state,
            clock,
            fault_hook,
            control_task,
            rx_task,
        })
    }

    /// Stores a receiver frame. `valid` is false when the receiver reported
    /// a failsafe or a corrupt frame.
    pub fn set_receiver(&mut self, channels: RcChannels, valid: bool, now: u32) {
        if valid {
            self.state.channels = channels;
        }
        self.state.frame_valid = valid;
        self.state.frame_at = now;
        self.state.new_frame = true;
    }

    /// Stores the latest inertial measurements.
    pub fn set_attitude(&mut self, snapshot: AttitudeSnapshot) {
        self.state.attitude = snapshot;
    }

    /// Sets the roll and pitch trim in decidegrees.
    pub fn set_trim(&mut self, trim_dd: [i16; 2]) {
        self.state.trim_dd = trim_dd;
    }

    /// Sets the flight modes and switches.
    pub fn set_modes(&mut self, modes: FlightModes) {
        self.state.modes = modes;
    }

    /// Suspends link tracking while the receiver is reconfigured.
    pub fn suspend_link(&mut self) {
        self.state.link.suspend();
    }

    /// Resumes link tracking with the link up.
    pub fn resume_link(&mut self, now: u32) {
        self.state.link.resume(now);
    }

    /// Runs one scheduler pass. Returns the task that ran, if any.
    ///
    /// A fatal fault never returns: it goes straight to the fault hook.
    pub fn run_once(&mut self, now: u32) -> Option<TaskId> {
        match self.scheduler.run_once(now, &self.clock, &mut self.state) {
            Ok(task) => task,
            Err(fault) => (self.fault_hook)(fault),
        }
    }

    /// Arming state.
    pub fn arming_state(&self) -> ArmingState {
        self.state.arming.state()
    }

    /// Whether the motors are live.
    pub fn is_armed(&self) -> bool {
        self.state.arming.is_armed()
    }

    /// Failsafe phase.
    pub fn failsafe_phase(&self) -> FailsafePhase {
        self.state.failsafe.phase()
    }

    /// Whether the receiver link is up.
    pub fn link_up(&self) -> bool {
        self.state.link.is_up()
    }

    /// Output path of the next control iteration.
    pub fn output_path(&self) -> OutputPath {
        self.state.path
    }

    /// Pulses of the last control iteration.
    pub fn outputs(&self) -> &MixerOutputs {
        self.state.mixer.outputs()
    }

    /// The actuator drivers.
    pub fn actuators(&self) -> &A {
        &self.state.actuators
    }

    /// The scheduler, for task statistics.
    pub fn scheduler(&self) -> &Scheduler<FlightState<A>> {
        &self.scheduler
    }

    /// Id of the control task.
    pub fn control_task(&self) -> TaskId {
        self.control_task
    }

    /// Id of the receiver task.
    pub fn rx_task(&self) -> TaskId {
        self.rx_task
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arming::ArmMethod;
    use crate::clock::{MockClock, MICROS_PER_MILLI};
    use crate::mixer::{Airframe, MAX_MOTORS};

    const STEP_US: u32 = 500;

    #[derive(Default)]
    struct RecordingActuators {
        motors: [u16; MAX_MOTORS],
        motor_writes: u32,
        fail: bool,
    }

    impl Actuators for RecordingActuators {
        fn write_motor(&mut self, index: usize, pulse: u16) -> Result<(), OutputError> {
            if self.fail {
                return Err(OutputError::DriverFault(index));
            }
            let slot = self.motors.get_mut(index).ok_or(OutputError::NoSuchChannel(index))?;
            *slot = pulse;
            self.motor_writes += 1;
            Ok(())
        }

        fn write_servo(&mut self, index: usize, _pulse: u16) -> Result<(), OutputError> {
            if self.fail {
                return Err(OutputError::DriverFault(index));
            }
            Ok(())
        }
    }

    fn halt(fault: FatalFault) -> ! {
        panic!("fatal fault: {}", fault)
    }

    fn sticks(roll: u16, pitch: u16, yaw: u16, throttle: u16) -> RcChannels {
        let mut channels = RcChannels::default();
        channels.pulses[channel::ROLL] = roll;
        channels.pulses[channel::PITCH] = pitch;
        channels.pulses[channel::YAW] = yaw;
        channels.pulses[channel::THROTTLE] = throttle;
        channels
    }

    type Core = FlightCore<RecordingActuators, MockClock>;

    fn core() -> Core {
        FlightCore::new(&Config::default(), RecordingActuators::default(), MockClock::new(0), halt)
            .expect("default configuration is valid")
    }

    /// Runs the core from `from` to `to`, feeding `frame` every receiver
    /// period when given.
    fn fly(core: &mut Core, from: u32, to: u32, frame: Option<RcChannels>) {
        let mut now = from;
        while now < to {
            if let Some(channels) = frame {
                if (now - from) % RX_PERIOD_US == 0 {
                    core.set_receiver(channels, true, now);
                }
            }
            core.run_once(now);
            now += STEP_US;
        }
    }

    fn arm(core: &mut Core) -> u32 {
        fly(core, 0, 1_500 * MICROS_PER_MILLI, Some(sticks(1500, 1500, 2000, 1000)));
        1_500 * MICROS_PER_MILLI
    }

    /// Test that disarmed motors sit at mincommand.
    #[test]
    fn test_flight_disarmed_outputs() {
        let mut core = core();
        fly(&mut core, 0, 100 * MICROS_PER_MILLI, Some(sticks(1500, 1500, 1500, 1000)));
        assert!(!core.is_armed(), "Not armed.");
        assert_eq!(OutputPath::Disarmed, core.output_path(), "Disarmed path.");
        assert!(core.actuators().motor_writes > 0, "Motors written.");
        assert_eq!(&[1000; 4], &core.actuators().motors[..4], "Motors at mincommand.");
    }

    /// Test arming with the stick combo and a level hover.
    #[test]
    fn test_flight_arm_and_hover() {
        let mut core = core();
        let armed_at = arm(&mut core);
        assert_eq!(
            ArmingState::Armed { method: ArmMethod::Sticks },
            core.arming_state(),
            "Armed with sticks."
        );
        assert_eq!(OutputPath::Normal, core.output_path(), "Normal path.");

        core.set_modes(FlightModes {
            level: true,
            ..FlightModes::default()
        });
        fly(&mut core, armed_at, armed_at + MICROS_PER_SECOND, Some(sticks(1500, 1500, 1500, 1500)));

        let motors = &core.actuators().motors[..4];
        assert!(motors.iter().all(|&pulse| pulse == motors[0]), "Level hover drives equal motors.");
        assert!(motors[0] > 1150, "Motors above minthrottle.");
        assert!(motors[0] < 1850, "Motors below maxthrottle.");
    }

    /// Test that a steady tilt in angle mode gives a steady demand.
    #[test]
    fn test_flight_level_hold_with_steady_tilt() {
        let mut core = core();
        let armed_at = arm(&mut core);
        core.set_modes(FlightModes {
            level: true,
            ..FlightModes::default()
        });
        core.set_attitude(AttitudeSnapshot {
            gyro_adc: [0; 3],
            attitude_dd: [100, 0],
        });
        let hover = Some(sticks(1500, 1500, 1500, 1500));

        let settled = armed_at + 3 * MICROS_PER_SECOND;
        fly(&mut core, armed_at, settled, hover);
        let first = core.state.controller.output().terms[0];
        let motors = core.actuators().motors;
        assert_eq!(-40, first.p, "Roll P is the angle error times the level gain.");
        assert!(motors[..4].iter().any(|&pulse| pulse != motors[0]), "Roll is corrected.");

        fly(&mut core, settled, settled + 2 * MICROS_PER_SECOND, hover);
        let last = core.state.controller.output().terms[0];
        assert_eq!(first, last, "Roll terms hold under a steady tilt.");
        assert_eq!(motors, core.actuators().motors, "Motors hold under a steady tilt.");
    }

    /// Test that a tilt rotor raises thrust as the body pitches.
    #[test]
    fn test_flight_tilt_rotor_body_pitch() {
        let hover_motors = |pitch_dd: i16| {
            let mut config = Config::default();
            config.mixer.airframe = Airframe::QuadXTilt1;
            let mut core = FlightCore::new(&config, RecordingActuators::default(), MockClock::new(0), halt)
                .expect("tilt rotor configuration is valid");
            let armed_at = arm(&mut core);
            core.set_attitude(AttitudeSnapshot {
                gyro_adc: [0; 3],
                attitude_dd: [0, pitch_dd],
            });
            fly(&mut core, armed_at, armed_at + MICROS_PER_SECOND, Some(sticks(1500, 1500, 1500, 1500)));
            assert!(core.is_armed(), "Tilt rotor armed.");
            core.actuators().motors
        };

        let level = hover_motors(0);
        let pitched = hover_motors(200);
        assert!(level[..4].iter().all(|&pulse| pulse == level[0]), "Level hover is even.");
        assert!(pitched[..4].iter().all(|&pulse| pulse == pitched[0]), "Pitched hover is even.");
        assert!(pitched[0] > level[0], "Thrust rises with the body pitch.");
    }

    /// Test that arming is refused while the link is still down.
    #[test]
    fn test_flight_no_arming_without_link() {
        let mut core = core();
        fly(&mut core, 0, 150 * MICROS_PER_MILLI, Some(sticks(1500, 1500, 2000, 1000)));
        assert!(!core.is_armed(), "Link not yet up.");
    }

    /// Test that losing the link in flight hands control to the failsafe.
    #[test]
    fn test_flight_link_loss() {
        let mut core = core();
        let armed_at = arm(&mut core);
        let cruise_end = 6 * MICROS_PER_SECOND;
        fly(&mut core, armed_at, cruise_end, Some(sticks(1500, 1500, 1500, 1500)));
        assert!(core.link_up(), "Link up while frames flow.");

        fly(&mut core, cruise_end, cruise_end + 2 * MICROS_PER_SECOND, None);
        assert!(!core.link_up(), "Link down after the failure window.");
        assert!(
            matches!(core.failsafe_phase(), FailsafePhase::Landing { .. }),
            "Failsafe landing."
        );
        assert!(core.is_armed(), "Still armed while landing.");
        assert_eq!(OutputPath::FailsafeForced, core.output_path(), "Failsafe owns the outputs.");

        fly(&mut core, cruise_end + 2 * MICROS_PER_SECOND, cruise_end + 23 * MICROS_PER_SECOND, None);
        assert!(!core.is_armed(), "Landed disarms.");
        assert_eq!(&[1000; 4], &core.actuators().motors[..4], "Motors stopped.");
    }

    /// Test that an actuator fault reaches the fault hook.
    #[test]
    #[should_panic(expected = "fatal fault")]
    fn test_flight_actuator_fault() {
        let mut core = core();
        core.state.actuators.fail = true;
        fly(&mut core, 0, 10 * MICROS_PER_MILLI, None);
    }

    /// Test the output path table.
    #[test]
    fn test_flight_select_path() {
        let forced = Some(ForcedControl {
            throttle: 1000,
            level: true,
        });
        assert_eq!(OutputPath::Disarmed, select_path(false, forced), "Disarmed wins.");
        assert_eq!(OutputPath::FailsafeForced, select_path(true, forced), "Forced.");
        assert_eq!(OutputPath::Normal, select_path(true, None), "Normal.");
    }
}
