//! Single-byte serial command interpreter.
//!
//! The companion computer steers the vehicle by writing one ASCII character
//! per command; there is no framing and no acknowledgement. Mode-force
//! symbols are always honored. Steering and drive symbols only take effect
//! while the controller is autonomous at the moment the byte is processed.

use core::fmt;

use super::mode::{Mode, ModeController};
use crate::config::AutonomousConfig;
use crate::Degrees;

/// Discrete steering symbols.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SteeringCommand {
    HardLeft,
    SoftLeft,
    Straight,
    SoftRight,
    HardRight,
}

impl SteeringCommand {
    /// Servo angle the symbol snaps to.
    #[must_use]
    pub const fn angle(self, config: &AutonomousConfig) -> Degrees {
        match self {
            SteeringCommand::HardLeft => config.hard_left,
            SteeringCommand::SoftLeft => config.soft_left,
            SteeringCommand::Straight => config.straight,
            SteeringCommand::SoftRight => config.soft_right,
            SteeringCommand::HardRight => config.hard_right,
        }
    }
}

/// Drive intent, shared by the manual and autonomous paths.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum DriveCommand {
    Forward,
    /// Reverse; also lights both indicators as brake lights.
    Backward,
    #[default]
    Neutral,
}

impl fmt::Display for DriveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveCommand::Forward => f.write_str("forward"),
            DriveCommand::Backward => f.write_str("backward"),
            DriveCommand::Neutral => f.write_str("neutral"),
        }
    }
}

/// Every recognized serial symbol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    ForceMode(Mode),
    Steer(SteeringCommand),
    Drive(DriveCommand),
}

impl Command {
    /// Decodes one byte; unknown bytes yield `None`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        let command = match byte {
            b'a' => Command::ForceMode(Mode::Autonomous),
            b'n' => Command::ForceMode(Mode::Manual),
            b'L' => Command::Steer(SteeringCommand::HardLeft),
            b'l' => Command::Steer(SteeringCommand::SoftLeft),
            b's' => Command::Steer(SteeringCommand::Straight),
            b'r' => Command::Steer(SteeringCommand::SoftRight),
            b'R' => Command::Steer(SteeringCommand::HardRight),
            b'f' => Command::Drive(DriveCommand::Forward),
            b'b' => Command::Drive(DriveCommand::Backward),
            b'x' => Command::Drive(DriveCommand::Neutral),
            _ => return None,
        };
        Some(command)
    }

    /// Wire byte for this command.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Command::ForceMode(mode) => mode.status_byte(),
            Command::Steer(SteeringCommand::HardLeft) => b'L',
            Command::Steer(SteeringCommand::SoftLeft) => b'l',
            Command::Steer(SteeringCommand::Straight) => b's',
            Command::Steer(SteeringCommand::SoftRight) => b'r',
            Command::Steer(SteeringCommand::HardRight) => b'R',
            Command::Drive(DriveCommand::Forward) => b'f',
            Command::Drive(DriveCommand::Backward) => b'b',
            Command::Drive(DriveCommand::Neutral) => b'x',
        }
    }
}

/// Last autonomous steering target and drive symbol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AutonomousIntent {
    pub steering_angle: Degrees,
    pub drive: DriveCommand,
}

impl AutonomousIntent {
    /// Straight ahead, stopped.
    #[must_use]
    pub const fn new(config: &AutonomousConfig) -> Self {
        Self {
            steering_angle: config.straight,
            drive: DriveCommand::Neutral,
        }
    }
}

/// How a single byte was handled.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    /// Changed the mode or the autonomous intent.
    Applied(Command),
    /// Recognized but had no effect (re-asserted mode, or manual gating).
    NoEffect(Command),
    /// Not a command byte.
    Unrecognized(u8),
}

/// Applies serial command bytes to the mode controller and autonomous intent.
#[derive(Clone, Debug)]
pub struct CommandInterpreter {
    angles: AutonomousConfig,
    intent: AutonomousIntent,
    ignored: u32,
}

impl CommandInterpreter {
    #[must_use]
    pub const fn new(angles: AutonomousConfig) -> Self {
        Self {
            intent: AutonomousIntent::new(&angles),
            angles,
            ignored: 0,
        }
    }

    /// Intent retained across ticks until superseded.
    #[must_use]
    pub const fn intent(&self) -> AutonomousIntent {
        self.intent
    }

    /// Bytes that were unrecognized or gated out since start-up.
    #[must_use]
    pub const fn ignored_count(&self) -> u32 {
        self.ignored
    }

    /// Handles one byte against the current mode.
    pub fn apply(&mut self, byte: u8, mode: &mut ModeController) -> CommandOutcome {
        let Some(command) = Command::from_byte(byte) else {
            self.ignored = self.ignored.wrapping_add(1);
            return CommandOutcome::Unrecognized(byte);
        };

        let applied = match command {
            Command::ForceMode(target) => mode.force(target),
            Command::Steer(steering) if mode.mode().is_autonomous() => {
                self.intent.steering_angle = steering.angle(&self.angles);
                true
            }
            Command::Drive(drive) if mode.mode().is_autonomous() => {
                self.intent.drive = drive;
                true
            }
            Command::Steer(_) | Command::Drive(_) => false,
        };

        if applied {
            CommandOutcome::Applied(command)
        } else {
            self.ignored = self.ignored.wrapping_add(1);
            CommandOutcome::NoEffect(command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn autonomous_controller() -> ModeController {
        let mut mode = ModeController::new(1500);
        mode.force(Mode::Autonomous);
        mode
    }

    #[test]
    fn byte_table_round_trips() {
        for byte in *b"anLlsrRfbx" {
            let command = Command::from_byte(byte).expect("known symbol");
            assert_eq!(command.as_byte(), byte);
        }
        for byte in *b" \r\nzA0?" {
            assert_eq!(Command::from_byte(byte), None);
        }
    }

    #[test]
    fn steering_snaps_immediately_in_autonomous() {
        let mut mode = autonomous_controller();
        let mut interpreter = CommandInterpreter::new(AutonomousConfig::DEFAULT);
        assert_eq!(interpreter.intent().steering_angle, 90);

        interpreter.apply(b'L', &mut mode);
        assert_eq!(interpreter.intent().steering_angle, 135);
        interpreter.apply(b'r', &mut mode);
        assert_eq!(interpreter.intent().steering_angle, 67);
        interpreter.apply(b's', &mut mode);
        assert_eq!(interpreter.intent().steering_angle, 90);
    }

    #[test]
    fn drive_intent_persists_until_superseded() {
        let mut mode = autonomous_controller();
        let mut interpreter = CommandInterpreter::new(AutonomousConfig::DEFAULT);
        interpreter.apply(b'f', &mut mode);
        interpreter.apply(b'l', &mut mode);
        assert_eq!(interpreter.intent().drive, DriveCommand::Forward);
        interpreter.apply(b'b', &mut mode);
        assert_eq!(interpreter.intent().drive, DriveCommand::Backward);
        interpreter.apply(b'x', &mut mode);
        assert_eq!(interpreter.intent().drive, DriveCommand::Neutral);
    }

    #[test]
    fn manual_mode_gates_control_symbols() {
        let mut mode = ModeController::new(1500);
        let mut interpreter = CommandInterpreter::new(AutonomousConfig::DEFAULT);

        assert_eq!(
            interpreter.apply(b'f', &mut mode),
            CommandOutcome::NoEffect(Command::Drive(DriveCommand::Forward))
        );
        assert_eq!(interpreter.apply(b'R', &mut mode), CommandOutcome::NoEffect(Command::Steer(SteeringCommand::HardRight)));
        assert_eq!(interpreter.intent(), AutonomousIntent::new(&AutonomousConfig::DEFAULT));
        assert_eq!(interpreter.ignored_count(), 2);
    }

    #[test]
    fn mode_symbols_work_in_any_mode() {
        let mut mode = ModeController::new(1500);
        let mut interpreter = CommandInterpreter::new(AutonomousConfig::DEFAULT);

        // Switch, then immediately command within the same drain.
        assert!(matches!(interpreter.apply(b'a', &mut mode), CommandOutcome::Applied(_)));
        assert!(matches!(interpreter.apply(b'f', &mut mode), CommandOutcome::Applied(_)));
        assert!(matches!(interpreter.apply(b'a', &mut mode), CommandOutcome::NoEffect(_)));
        assert!(matches!(interpreter.apply(b'n', &mut mode), CommandOutcome::Applied(_)));
        assert_eq!(mode.mode(), Mode::Manual);
        // Intent survives leaving autonomous mode.
        assert_eq!(interpreter.intent().drive, DriveCommand::Forward);
    }

    #[test]
    fn unknown_bytes_are_counted_and_dropped() {
        let mut mode = autonomous_controller();
        let mut interpreter = CommandInterpreter::new(AutonomousConfig::DEFAULT);
        assert_eq!(interpreter.apply(b'\n', &mut mode), CommandOutcome::Unrecognized(b'\n'));
        assert_eq!(interpreter.ignored_count(), 1);
        assert_eq!(interpreter.intent(), AutonomousIntent::new(&AutonomousConfig::DEFAULT));
    }
}
