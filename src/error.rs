// src/error.rs

//! # Errors
//!
//! Configuration problems are rejected once, when the configuration is
//! loaded. The control path itself is total and never returns these; the
//! only run time failure is a [`FatalFault`] raised by a task, which the
//! composition root forwards to the host's fault hook.

use thiserror::Error;

/// A configuration value outside its valid range.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Receiver check band is inverted or outside 1000..=2000.
    #[error("receiver check band {min_check}..{max_check} is invalid")]
    CheckBand {
        /// Low stick threshold.
        min_check: u16,
        /// High stick threshold.
        max_check: u16,
    },

    /// Stick mid point lies outside the check band.
    #[error("stick mid point {0} lies outside the check band")]
    MidPoint(u16),

    /// A percentage style parameter exceeds its maximum.
    #[error("{name} = {value} exceeds {max}")]
    OutOfRange {
        /// Name of the offending field.
        name: &'static str,
        /// Value found.
        value: i32,
        /// Largest allowed value.
        max: i32,
    },

    /// A parameter falls below its minimum.
    #[error("{name} = {value} is below {min}")]
    BelowMinimum {
        /// Name of the offending field.
        name: &'static str,
        /// Value found.
        value: i32,
        /// Smallest allowed value.
        min: i32,
    },

    /// Motor pulse limits are not ordered `mincommand <= minthrottle < maxthrottle`.
    #[error("motor limits {mincommand}/{minthrottle}/{maxthrottle} are not ordered")]
    MotorRange {
        /// Pulse sent while disarmed.
        mincommand: u16,
        /// Lowest armed pulse.
        minthrottle: u16,
        /// Highest pulse.
        maxthrottle: u16,
    },

    /// A mixer rule is malformed.
    #[error("mixer rule {index} is invalid")]
    MixerRule {
        /// Position of the rule in the table.
        index: usize,
    },

    /// An output channel has an empty or inverted pulse range.
    #[error("output channel {index} has an invalid pulse range")]
    OutputChannel {
        /// Output channel index.
        index: usize,
    },

    /// Tilt servo angle range is empty or beyond +-90 degrees.
    #[error("tilt angle range {min}..{max} is invalid")]
    TiltRange {
        /// Lowest servo angle in degrees.
        min: i8,
        /// Highest servo angle in degrees.
        max: i8,
    },
}

/// Failures when building the scheduler task table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerError {
    /// The task table has no room for another task.
    #[error("task table is full")]
    TableFull,

    /// The task id does not name a registered task.
    #[error("unknown task {0}")]
    UnknownTask(usize),
}

/// Failure reported by an actuator output driver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// The channel index is not wired to hardware.
    #[error("output channel {0} is not available")]
    NoSuchChannel(usize),

    /// The driver rejected the write.
    #[error("output driver fault on channel {0}")]
    DriverFault(usize),
}

/// Unrecoverable condition inside a scheduled task.
///
/// The core never tries to recover from these. The host decides how to halt
/// or reset the unit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalFault {
    /// Actuator output failed while the vehicle may be armed.
    #[error("task {task} lost actuator output: {source}")]
    Output {
        /// Task that was running.
        task: &'static str,
        /// Underlying driver failure.
        source: OutputError,
    },
}

/// Failure to assemble the flight core.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The configuration did not validate.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The task table could not be built.
    #[error("scheduler setup failed: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// Result of configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;
