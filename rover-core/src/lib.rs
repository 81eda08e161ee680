#![no_std]

// Receiver decoding and control arbitration shared by the rover firmware and
// the host emulator.
//
// Everything here is free of the standard library and of hardware types; the
// firmware and emulator crates plug their peripherals in through the traits in
// `actuators` and `scheduler`.

pub mod actuators;
pub mod capture;
pub mod config;
pub mod control;
pub mod filter;
pub mod output;
pub mod scheduler;
pub mod telemetry;

/// Pulse width or timestamp in microseconds.
pub type Micros = u32;

/// Timestamp in milliseconds.
pub type Millis = u32;

/// Servo angle in degrees.
pub type Degrees = u8;
