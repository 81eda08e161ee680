//! Hardware seams for the controller outputs and the serial link.
//!
//! The firmware implements these with timer PWM, GPIO and a UART; the
//! emulator and the tests implement them with in-memory recorders.

use crate::{Degrees, Micros};

/// Which indicator lamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndicatorSide {
    Left,
    Right,
}

/// Servo or ESC output. Writes are fire-and-forget.
pub trait ServoOutput {
    /// Positions the servo at `degrees` (0–180).
    fn write_angle(&mut self, degrees: Degrees);

    /// Emits a raw pulse width.
    fn write_pulse_us(&mut self, pulse_us: Micros);
}

/// Indicator lamp outputs.
pub trait IndicatorOutput {
    fn set_indicator(&mut self, side: IndicatorSide, on: bool);
}

/// Everything the output stage writes each tick.
pub trait ActuatorDriver {
    type Steering: ServoOutput;
    type Drive: ServoOutput;
    type Indicators: IndicatorOutput;

    fn steering(&mut self) -> &mut Self::Steering;
    fn drive(&mut self) -> &mut Self::Drive;
    fn indicators(&mut self) -> &mut Self::Indicators;
}

/// Byte-oriented duplex link to the companion computer.
pub trait SerialLink {
    /// Returns a buffered byte without waiting.
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Queues a byte for transmission; dropped if the link cannot take it.
    fn write_byte(&mut self, byte: u8);

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.write_byte(byte);
        }
    }
}

/// Output sink that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopActuators;

impl NoopActuators {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ServoOutput for NoopActuators {
    fn write_angle(&mut self, _: Degrees) {}

    fn write_pulse_us(&mut self, _: Micros) {}
}

impl IndicatorOutput for NoopActuators {
    fn set_indicator(&mut self, _: IndicatorSide, _: bool) {}
}

impl ActuatorDriver for NoopActuators {
    type Steering = Self;
    type Drive = Self;
    type Indicators = Self;

    fn steering(&mut self) -> &mut Self {
        self
    }

    fn drive(&mut self) -> &mut Self {
        self
    }

    fn indicators(&mut self) -> &mut Self {
        self
    }
}

/// Converts servo angles and pulse widths into timer units.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ServoCalibration {
    /// Pulse at 0°.
    pub min_pulse_us: Micros,
    /// Pulse at 180°.
    pub max_pulse_us: Micros,
    /// PWM frame length.
    pub frame_us: Micros,
}

impl ServoCalibration {
    /// Common hobby-servo travel in a 50 Hz frame.
    pub const DEFAULT: Self = Self {
        min_pulse_us: 544,
        max_pulse_us: 2400,
        frame_us: 20_000,
    };

    /// Pulse width for `degrees`, saturating at 180°.
    #[must_use]
    pub const fn pulse_for_angle(&self, degrees: Degrees) -> Micros {
        let degrees = if degrees > 180 { 180 } else { degrees as Micros };
        self.min_pulse_us + degrees * (self.max_pulse_us - self.min_pulse_us) / 180
    }

    /// Timer compare value for `pulse_us` given the timer's `max_duty`,
    /// saturating at a full frame.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn duty_for_pulse(&self, pulse_us: Micros, max_duty: u16) -> u16 {
        let pulse = if pulse_us > self.frame_us { self.frame_us } else { pulse_us };
        (max_duty as u64 * pulse as u64 / self.frame_us as u64) as u16
    }
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}
