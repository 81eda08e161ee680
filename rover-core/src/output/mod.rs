//! Maps the settled control state onto actuator and indicator values.
//!
//! [`map_outputs`] is a pure function of (configuration, mode, filtered
//! inputs, autonomous intent, time). [`apply_frame`] writes every output on
//! every call, whether or not it changed, so a write lost by a collaborator is
//! corrected on the next tick.

use crate::actuators::{ActuatorDriver, IndicatorOutput, IndicatorSide, ServoOutput};
use crate::config::{ControlConfig, DriveConfig, IndicatorConfig, SteeringConfig};
use crate::control::command::{AutonomousIntent, DriveCommand};
use crate::control::mode::Mode;
use crate::{Degrees, Micros, Millis};

/// Filtered receiver widths consumed in manual mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FilteredInputs {
    pub steering_us: Micros,
    pub drive_us: Micros,
}

/// Indicator lamp levels for one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct IndicatorState {
    pub left: bool,
    pub right: bool,
}

impl IndicatorState {
    pub const OFF: Self = Self {
        left: false,
        right: false,
    };
    pub const BRAKE: Self = Self {
        left: true,
        right: true,
    };
}

/// Everything written to the collaborators in one tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorFrame {
    pub steering_angle: Degrees,
    pub drive: DriveCommand,
    pub drive_pulse_us: Micros,
    pub indicators: IndicatorState,
}

/// Arduino-style `map`: integer affine transform with truncation. An empty
/// input range maps everything onto `out_min`.
#[allow(clippy::cast_lossless)]
const fn remap(
    value: Micros,
    in_min: Micros,
    in_max: Micros,
    out_min: Degrees,
    out_max: Degrees,
) -> i64 {
    let value = value as i64;
    let (in_min, in_max) = (in_min as i64, in_max as i64);
    let (out_min, out_max) = (out_min as i64, out_max as i64);
    match ((value - in_min) * (out_max - out_min)).checked_div(in_max - in_min) {
        Some(scaled) => scaled + out_min,
        None => out_min,
    }
}

/// Manual steering: clamp the width to the stick range, map it onto the
/// servo travel, then clamp the angle again.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn manual_steering_angle(config: &SteeringConfig, steering_us: Micros) -> Degrees {
    let clamped = steering_us.clamp(config.pulse_min_us, config.pulse_max_us);
    let angle = remap(
        clamped,
        config.pulse_min_us,
        config.pulse_max_us,
        config.angle_min,
        config.angle_max,
    );
    angle.clamp(i64::from(config.angle_min), i64::from(config.angle_max)) as Degrees
}

/// Manual drive: tri-state decision with a neutral dead-band.
#[must_use]
pub const fn manual_drive(config: &DriveConfig, drive_us: Micros) -> DriveCommand {
    if drive_us > config.forward_above_us {
        DriveCommand::Forward
    } else if drive_us < config.reverse_below_us {
        DriveCommand::Backward
    } else {
        DriveCommand::Neutral
    }
}

/// Calibrated ESC pulse for a drive intent.
#[must_use]
pub const fn drive_pulse(config: &DriveConfig, drive: DriveCommand) -> Micros {
    match drive {
        DriveCommand::Forward => config.forward_pulse_us,
        DriveCommand::Backward => config.reverse_pulse_us,
        DriveCommand::Neutral => config.neutral_pulse_us,
    }
}

/// `true` during the lit half of the blink cycle. A zero period never lights.
#[must_use]
pub const fn blink_phase_on(config: &IndicatorConfig, now_ms: Millis) -> bool {
    match now_ms.checked_rem(config.blink_period_ms) {
        Some(phase) => phase < config.blink_on_ms,
        None => false,
    }
}

/// Steering angle the turn signals treat as straight ahead: where the neutral
/// stick lands in manual mode, the `straight` symbol in autonomous mode.
#[must_use]
pub fn straight_ahead_angle(config: &ControlConfig, mode: Mode) -> Degrees {
    match mode {
        Mode::Manual => manual_steering_angle(&config.steering, config.neutral_pulse_us),
        Mode::Autonomous => config.autonomous.straight,
    }
}

/// Brake beats turn beats idle.
#[must_use]
pub fn indicator_state(
    config: &ControlConfig,
    mode: Mode,
    steering_angle: Degrees,
    drive: DriveCommand,
    now_ms: Millis,
) -> IndicatorState {
    if drive == DriveCommand::Backward {
        return IndicatorState::BRAKE;
    }

    let center = straight_ahead_angle(config, mode);
    let deadband = config.steering.turn_deadband_deg;
    let lit = blink_phase_on(&config.indicator, now_ms);

    if steering_angle > center.saturating_add(deadband) {
        IndicatorState {
            left: lit,
            right: false,
        }
    } else if steering_angle < center.saturating_sub(deadband) {
        IndicatorState {
            left: false,
            right: lit,
        }
    } else {
        IndicatorState::OFF
    }
}

/// Computes the frame for the current tick.
///
/// In autonomous mode the receiver inputs are not consulted.
#[must_use]
pub fn map_outputs(
    config: &ControlConfig,
    mode: Mode,
    inputs: FilteredInputs,
    intent: AutonomousIntent,
    now_ms: Millis,
) -> ActuatorFrame {
    let (steering_angle, drive) = match mode {
        Mode::Manual => (
            manual_steering_angle(&config.steering, inputs.steering_us),
            manual_drive(&config.drive, inputs.drive_us),
        ),
        Mode::Autonomous => (intent.steering_angle, intent.drive),
    };

    ActuatorFrame {
        steering_angle,
        drive,
        drive_pulse_us: drive_pulse(&config.drive, drive),
        indicators: indicator_state(config, mode, steering_angle, drive, now_ms),
    }
}

/// Writes every output in `frame`.
pub fn apply_frame<A>(frame: &ActuatorFrame, actuators: &mut A)
where
    A: ActuatorDriver,
{
    actuators.steering().write_angle(frame.steering_angle);
    actuators.drive().write_pulse_us(frame.drive_pulse_us);
    let indicators = actuators.indicators();
    indicators.set_indicator(IndicatorSide::Left, frame.indicators.left);
    indicators.set_indicator(IndicatorSide::Right, frame.indicators.right);
}
