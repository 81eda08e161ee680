//! Per-tick control pipeline.
//!
//! [`RoverController`] owns every piece of mutable control state (filters,
//! mode, autonomous intent, telemetry) and advances it once per scheduler
//! tick. The order inside a tick is fixed: filter the fresh capture snapshot,
//! check the mode-select channel for a crossing, drain serial commands,
//! announce a mode change, then compute and write the outputs.
//!
//! The serial link only ever carries the one-byte mode notifications. The
//! human-readable debug line is returned in [`TickReport::debug`] for the
//! caller to log.

pub mod command;
pub mod mode;

use crate::actuators::{ActuatorDriver, SerialLink};
use crate::capture::CaptureSnapshot;
use crate::config::{ConfigError, ControlConfig};
use crate::filter::FilterBank;
use crate::output::{ActuatorFrame, FilteredInputs, apply_frame, map_outputs};
use crate::telemetry::{DebugFrame, TELEMETRY_RING_CAPACITY, TelemetryEventKind, TelemetryRecorder};
use crate::Millis;

use self::command::{AutonomousIntent, CommandInterpreter, CommandOutcome};
use self::mode::{Mode, ModeController, ModeTransition};

/// Number of receiver channels passed through the moving average.
pub const FILTERED_CHANNELS: usize = 2;

/// Result of one tick, for logging and inspection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    pub frame: ActuatorFrame,
    pub debug: DebugFrame,
    pub transition: Option<ModeTransition>,
    /// Bytes read from the serial link this tick.
    pub bytes_drained: usize,
}

/// Controller state record, one instance per vehicle.
pub struct RoverController<const TELEMETRY: usize = TELEMETRY_RING_CAPACITY> {
    config: ControlConfig,
    filters: FilterBank<FILTERED_CHANNELS>,
    filtered: FilteredInputs,
    mode: ModeController,
    commands: CommandInterpreter,
    telemetry: TelemetryRecorder<TELEMETRY>,
    ticks: u32,
}

impl<const TELEMETRY: usize> RoverController<TELEMETRY> {
    fn from_validated(config: ControlConfig) -> Self {
        let neutral = config.neutral_pulse_us;
        Self {
            filters: FilterBank::new(neutral),
            filtered: FilteredInputs {
                steering_us: neutral,
                drive_us: neutral,
            },
            mode: ModeController::new(config.mode_threshold_us()),
            commands: CommandInterpreter::new(config.autonomous),
            telemetry: TelemetryRecorder::new(),
            ticks: 0,
            config,
        }
    }

    /// Builds a controller after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] reported by [`ControlConfig::validate`].
    pub fn try_new(config: ControlConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode.mode()
    }

    #[must_use]
    pub const fn intent(&self) -> AutonomousIntent {
        self.commands.intent()
    }

    /// Filtered widths computed on the last tick.
    #[must_use]
    pub const fn filtered(&self) -> FilteredInputs {
        self.filtered
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder<TELEMETRY> {
        &self.telemetry
    }

    #[must_use]
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Bytes ignored by the command interpreter since start-up.
    #[must_use]
    pub const fn ignored_commands(&self) -> u32 {
        self.commands.ignored_count()
    }

    /// Notes ticks the scheduler skipped.
    pub fn record_dropped_ticks(&mut self, count: u32, now_ms: Millis) {
        if count > 0 {
            self.telemetry
                .record(TelemetryEventKind::TicksDropped(count), now_ms);
        }
    }

    /// Runs one control tick.
    pub fn tick<S, A>(
        &mut self,
        now_ms: Millis,
        snapshot: CaptureSnapshot,
        serial: &mut S,
        actuators: &mut A,
    ) -> TickReport
    where
        S: SerialLink,
        A: ActuatorDriver,
    {
        self.ticks = self.ticks.wrapping_add(1);
        self.mode.begin_tick();

        let [steering_us, drive_us] = self
            .filters
            .update([snapshot.steering_us, snapshot.drive_us]);
        self.filtered = FilteredInputs {
            steering_us,
            drive_us,
        };

        self.mode.observe_select(snapshot.mode_select_us);
        let bytes_drained = self.drain_commands(serial, now_ms);

        let transition = self.mode.finish_tick();
        if let Some(transition) = transition {
            serial.write_byte(transition.to.status_byte());
            self.telemetry.record(
                TelemetryEventKind::ModeEntered {
                    mode: transition.to,
                    cause: transition.cause,
                },
                now_ms,
            );
        }

        let mode = self.mode.mode();
        let frame = map_outputs(&self.config, mode, self.filtered, self.commands.intent(), now_ms);
        apply_frame(&frame, actuators);

        TickReport {
            frame,
            debug: DebugFrame {
                mode,
                steering_filtered_us: steering_us,
                drive_filtered_us: drive_us,
                mode_select_us: snapshot.mode_select_us,
                frame,
            },
            transition,
            bytes_drained,
        }
    }

    fn drain_commands<S>(&mut self, serial: &mut S, now_ms: Millis) -> usize
    where
        S: SerialLink,
    {
        let mut drained = 0;
        while let Some(byte) = serial.try_read_byte() {
            drained += 1;

            let event = match self.commands.apply(byte, &mut self.mode) {
                CommandOutcome::Applied(command) => TelemetryEventKind::CommandApplied(command),
                CommandOutcome::NoEffect(command) => {
                    TelemetryEventKind::CommandIgnored(command.as_byte())
                }
                // Line terminators are routine on this link.
                CommandOutcome::Unrecognized(b'\r' | b'\n' | b' ') => continue,
                CommandOutcome::Unrecognized(byte) => TelemetryEventKind::CommandIgnored(byte),
            };
            self.telemetry.record(event, now_ms);
        }
        drained
    }
}

impl Default for RoverController {
    fn default() -> Self {
        Self::from_validated(ControlConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use heapless::{Deque, Vec};

    use super::*;
    use crate::actuators::NoopActuators;

    #[derive(Default)]
    struct LoopbackSerial {
        rx: Deque<u8, 128>,
        tx: Vec<u8, 512>,
    }

    impl LoopbackSerial {
        fn queue(&mut self, bytes: &[u8]) {
            for &byte in bytes {
                self.rx.push_back(byte).unwrap();
            }
        }
    }

    impl SerialLink for LoopbackSerial {
        fn try_read_byte(&mut self) -> Option<u8> {
            self.rx.pop_front()
        }

        fn write_byte(&mut self, byte: u8) {
            let _ = self.tx.push(byte);
        }
    }

    fn controller() -> RoverController {
        RoverController::default()
    }

    #[test]
    fn try_new_rejects_invalid_config() {
        let mut config = ControlConfig::DEFAULT;
        config.tick_interval_ms = 0;
        assert!(matches!(
            RoverController::<4>::try_new(config),
            Err(ConfigError::ZeroTickInterval)
        ));
    }

    #[test]
    fn autonomous_switch_is_announced_once() {
        let mut controller = controller();
        let mut serial = LoopbackSerial::default();
        let mut outputs = NoopActuators::new();
        let snapshot = CaptureSnapshot::uniform(1500);

        serial.queue(b"aa");
        let report = controller.tick(10, snapshot, &mut serial, &mut outputs);
        assert_eq!(report.transition.map(|t| t.to), Some(Mode::Autonomous));
        assert_eq!(report.bytes_drained, 2);

        serial.queue(b"a");
        let report = controller.tick(20, snapshot, &mut serial, &mut outputs);
        assert_eq!(report.transition, None);
        assert_eq!(serial.tx.as_slice(), b"a");
    }

    #[test]
    fn commands_after_force_apply_in_same_tick() {
        let mut controller = controller();
        let mut serial = LoopbackSerial::default();
        let mut outputs = NoopActuators::new();

        serial.queue(b"fLafL");
        let report = controller.tick(10, CaptureSnapshot::uniform(1500), &mut serial, &mut outputs);
        assert_eq!(controller.mode(), Mode::Autonomous);
        assert_eq!(report.frame.steering_angle, 135);
        assert_eq!(report.frame.drive_pulse_us, 1560);
        // The `f` and `L` before `a` were gated out in manual mode.
        assert_eq!(controller.ignored_commands(), 2);
    }

    #[test]
    fn try_new_rejects_zero_blink_period() {
        let mut config = ControlConfig::DEFAULT;
        config.indicator.blink_period_ms = 0;
        config.indicator.blink_on_ms = 0;
        assert!(matches!(
            RoverController::<4>::try_new(config),
            Err(ConfigError::BlinkTiming { period: 0, on: 0 })
        ));
    }

    #[test]
    fn backlog_is_drained_in_one_tick() {
        let mut controller = controller();
        let mut serial = LoopbackSerial::default();
        let mut outputs = NoopActuators::new();
        serial.queue(&[b'z'; 70]);
        serial.queue(b"aL");

        let report = controller.tick(10, CaptureSnapshot::uniform(1500), &mut serial, &mut outputs);
        assert_eq!(report.bytes_drained, 72);
        assert!(serial.rx.is_empty());
        assert_eq!(controller.mode(), Mode::Autonomous);
        assert_eq!(report.frame.steering_angle, 135);
    }

    #[test]
    fn link_carries_only_the_status_byte() {
        let mut controller = controller();
        let mut serial = LoopbackSerial::default();
        let mut outputs = NoopActuators::new();

        let quiet = controller.tick(10, CaptureSnapshot::uniform(1500), &mut serial, &mut outputs);
        assert!(serial.tx.is_empty());
        let mut line: heapless::String<128> = heapless::String::new();
        core::fmt::Write::write_fmt(&mut line, format_args!("{}", quiet.debug)).unwrap();
        assert!(line.starts_with("CH1: 1500 | CH2: 1500 |"));

        serial.queue(b"a");
        let report = controller.tick(20, CaptureSnapshot::uniform(1500), &mut serial, &mut outputs);
        assert!(report.transition.is_some());
        assert_eq!(serial.tx.as_slice(), b"a");
    }

    #[test]
    fn mode_changes_reach_telemetry() {
        let mut controller = controller();
        let mut serial = LoopbackSerial::default();
        let mut outputs = NoopActuators::new();

        controller.tick(10, CaptureSnapshot::uniform(1900), &mut serial, &mut outputs);
        controller.record_dropped_ticks(2, 20);
        let events: Vec<TelemetryEventKind, 4> = controller
            .telemetry()
            .oldest_first()
            .map(|record| record.event)
            .collect();
        assert_eq!(
            events.as_slice(),
            &[
                TelemetryEventKind::ModeEntered {
                    mode: Mode::Autonomous,
                    cause: mode::TransitionCause::Crossing,
                },
                TelemetryEventKind::TicksDropped(2),
            ]
        );
        assert_eq!(serial.tx.as_slice(), b"a");
    }
}
