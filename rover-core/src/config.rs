//! Calibration and timing constants gathered into one structure.
//!
//! Every threshold the control path consults lives in [`ControlConfig`] so a
//! deployment (or a test) can override it without touching the logic. The
//! defaults describe the reference vehicle: a 45–135° steering servo fed from a
//! 900–1800 µs stick range and an ESC driven with three fixed pulses.

use core::fmt;

use crate::{Degrees, Micros, Millis};

/// Steering channel range and servo travel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SteeringConfig {
    /// Filtered pulse width mapped onto [`SteeringConfig::angle_min`].
    pub pulse_min_us: Micros,
    /// Filtered pulse width mapped onto [`SteeringConfig::angle_max`].
    pub pulse_max_us: Micros,
    /// Full right lock.
    pub angle_min: Degrees,
    /// Full left lock.
    pub angle_max: Degrees,
    /// Deflection from straight ahead (degrees) before a turn signal starts
    /// blinking.
    pub turn_deadband_deg: Degrees,
}

impl SteeringConfig {
    pub const DEFAULT: Self = Self {
        pulse_min_us: 900,
        pulse_max_us: 1800,
        angle_min: 45,
        angle_max: 135,
        turn_deadband_deg: 10,
    };
}

/// Drive channel thresholds and ESC calibration pulses.
///
/// The thresholds are deliberately asymmetric: anything between
/// `reverse_below_us` and `forward_above_us` (inclusive) is neutral.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DriveConfig {
    pub forward_above_us: Micros,
    pub reverse_below_us: Micros,
    pub forward_pulse_us: Micros,
    pub neutral_pulse_us: Micros,
    pub reverse_pulse_us: Micros,
}

impl DriveConfig {
    pub const DEFAULT: Self = Self {
        forward_above_us: 1500,
        reverse_below_us: 1480,
        forward_pulse_us: 1560,
        neutral_pulse_us: 1500,
        reverse_pulse_us: 1440,
    };
}

/// Steering angles commanded by the discrete autonomous symbols.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AutonomousConfig {
    pub hard_left: Degrees,
    pub soft_left: Degrees,
    pub straight: Degrees,
    pub soft_right: Degrees,
    pub hard_right: Degrees,
}

impl AutonomousConfig {
    pub const DEFAULT: Self = Self {
        hard_left: 135,
        soft_left: 113,
        straight: 90,
        soft_right: 67,
        hard_right: 45,
    };

    const fn angles(&self) -> [Degrees; 5] {
        [
            self.hard_left,
            self.soft_left,
            self.straight,
            self.soft_right,
            self.hard_right,
        ]
    }
}

/// Turn-signal blink timing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorConfig {
    pub blink_period_ms: Millis,
    /// Lamp is lit while `now % blink_period_ms < blink_on_ms`.
    pub blink_on_ms: Millis,
}

impl IndicatorConfig {
    pub const DEFAULT: Self = Self {
        blink_period_ms: 400,
        blink_on_ms: 200,
    };
}

/// Complete controller configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ControlConfig {
    /// Scheduler period.
    pub tick_interval_ms: Millis,
    /// Neutral stick position: filter fill value, initial capture width and
    /// the mode-select crossing threshold.
    pub neutral_pulse_us: Micros,
    pub steering: SteeringConfig,
    pub drive: DriveConfig,
    pub autonomous: AutonomousConfig,
    pub indicator: IndicatorConfig,
}

impl ControlConfig {
    pub const DEFAULT: Self = Self {
        tick_interval_ms: 10,
        neutral_pulse_us: 1500,
        steering: SteeringConfig::DEFAULT,
        drive: DriveConfig::DEFAULT,
        autonomous: AutonomousConfig::DEFAULT,
        indicator: IndicatorConfig::DEFAULT,
    };

    /// Mode-select threshold; values at or below it read as "low".
    #[must_use]
    pub const fn mode_threshold_us(&self) -> Micros {
        self.neutral_pulse_us
    }

    /// Checks the configuration for ranges the mapper cannot work with.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }

        let steering = &self.steering;
        if steering.pulse_min_us >= steering.pulse_max_us {
            return Err(ConfigError::SteeringPulseRange {
                min: steering.pulse_min_us,
                max: steering.pulse_max_us,
            });
        }
        if steering.angle_min >= steering.angle_max {
            return Err(ConfigError::SteeringAngleRange {
                min: steering.angle_min,
                max: steering.angle_max,
            });
        }

        if self.drive.reverse_below_us > self.drive.forward_above_us {
            return Err(ConfigError::DriveThresholds {
                reverse_below: self.drive.reverse_below_us,
                forward_above: self.drive.forward_above_us,
            });
        }

        let indicator = &self.indicator;
        if indicator.blink_period_ms == 0 || indicator.blink_on_ms >= indicator.blink_period_ms {
            return Err(ConfigError::BlinkTiming {
                period: indicator.blink_period_ms,
                on: indicator.blink_on_ms,
            });
        }

        if let Some(angle) = self
            .autonomous
            .angles()
            .into_iter()
            .find(|angle| !(steering.angle_min..=steering.angle_max).contains(angle))
        {
            return Err(ConfigError::AutonomousAngle(angle));
        }

        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Reasons a [`ControlConfig`] is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroTickInterval,
    SteeringPulseRange { min: Micros, max: Micros },
    SteeringAngleRange { min: Degrees, max: Degrees },
    DriveThresholds { reverse_below: Micros, forward_above: Micros },
    BlinkTiming { period: Millis, on: Millis },
    AutonomousAngle(Degrees),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroTickInterval => f.write_str("tick interval must be non-zero"),
            ConfigError::SteeringPulseRange { min, max } => {
                write!(f, "steering pulse range {min}..{max}us is empty")
            }
            ConfigError::SteeringAngleRange { min, max } => {
                write!(f, "steering angle range {min}..{max} deg is empty")
            }
            ConfigError::DriveThresholds {
                reverse_below,
                forward_above,
            } => write!(
                f,
                "reverse threshold {reverse_below}us exceeds forward threshold {forward_above}us"
            ),
            ConfigError::BlinkTiming { period, on } => {
                write!(f, "blink on-time {on}ms must be shorter than period {period}ms")
            }
            ConfigError::AutonomousAngle(angle) => {
                write!(f, "autonomous angle {angle} deg outside steering travel")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(ControlConfig::default().validate(), Ok(()));
    }

    #[test]
    fn inverted_drive_thresholds_rejected() {
        let mut config = ControlConfig::DEFAULT;
        config.drive.reverse_below_us = 1600;
        assert_eq!(
            config.validate(),
            Err(ConfigError::DriveThresholds {
                reverse_below: 1600,
                forward_above: 1500,
            })
        );
    }

    #[test]
    fn blink_on_time_must_fit_period() {
        let mut config = ControlConfig::DEFAULT;
        config.indicator.blink_on_ms = 400;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BlinkTiming { .. })
        ));
    }

    #[test]
    fn zero_blink_period_rejected() {
        let mut config = ControlConfig::DEFAULT;
        config.indicator.blink_period_ms = 0;
        config.indicator.blink_on_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::BlinkTiming { period: 0, on: 0 })
        );
    }

    #[test]
    fn autonomous_angles_stay_inside_travel() {
        let mut config = ControlConfig::DEFAULT;
        config.autonomous.hard_left = 170;
        assert_eq!(config.validate(), Err(ConfigError::AutonomousAngle(170)));
    }
}
