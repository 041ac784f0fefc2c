// src/lib.rs

//! # Flight Control Core
//!
//! This crate provides the `no_std`, no-alloc flight-control core of a
//! multirotor or fixed-wing autopilot. It turns periodic sensor and receiver
//! snapshots into periodic motor and servo pulses.
//!
//! The core is split into the pieces that share its timing and safety rules:
//!
//! - [`scheduler`]: cooperative task scheduler with a realtime guard interval.
//! - [`rc`]: stick decoding, expo curves and inter-frame smoothing.
//! - [`pid`]: angle/rate controller with a fixed-point and a float algorithm.
//! - [`mixer`]: rule based motor and servo mixing with tilt compensation.
//! - [`arming`]: arming state machine with dwell timers and a disarm safety check.
//! - [`failsafe`]: link health tracking and the signal loss procedure.
//!
//! [`flight::FlightCore`] wires all of them to the scheduler.
//!
//! Hardware is reached only through the [`clock::Clock`] and
//! [`flight::Actuators`] traits, so everything runs on the host in tests.

#![no_std]
#![deny(missing_docs)]

#[macro_use]
pub mod log;

pub mod arming;
pub mod axis;
pub mod clock;
pub mod config;
pub mod error;
pub mod failsafe;
pub mod flight;
pub mod mixer;
pub mod number;
pub mod pid;
pub mod rc;
pub mod scheduler;

#[doc(inline)]
pub use axis::Axis;
#[doc(inline)]
pub use config::Config;
#[doc(inline)]
pub use error::{ConfigError, FatalFault, InitError, OutputError, SchedulerError};
#[doc(inline)]
pub use flight::{Actuators, FlightCore};
#[doc(inline)]
pub use number::Number;

#[cfg(test)]
mod test_utils;
