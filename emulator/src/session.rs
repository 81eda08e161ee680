use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rover_core::actuators::{ActuatorDriver, IndicatorOutput, IndicatorSide, SerialLink, ServoOutput};
use rover_core::capture::{ALL_CHANNELS, CHANNEL_COUNT, CaptureBank, ChannelId, EdgeLevel};
use rover_core::config::{ConfigError, ControlConfig};
use rover_core::control::mode::TransitionCause;
use rover_core::control::{RoverController, TickReport};
use rover_core::scheduler::{TickScheduler, Timebase};
use rover_core::{Degrees, Micros, Millis};

use crate::script::{self, ScriptCommand};

/// Receiver frame period; every channel emits one pulse per frame.
const RECEIVER_FRAME_MS: Millis = 20;
/// Telemetry records shown by `status`.
const STATUS_TELEMETRY_LINES: usize = 5;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "pulse",
        "pulse <steer|drive|mode> <us>  - set the width the simulated receiver emits",
    ),
    (
        "send",
        "send <bytes>                   - queue serial bytes (escapes: \\n \\r \\\\ \\xNN)",
    ),
    ("tick", "tick [n]                       - run n control ticks"),
    (
        "advance",
        "advance <ms>                   - advance the simulated clock",
    ),
    (
        "status",
        "status                         - show outputs, mode and recent telemetry",
    ),
    (
        "help",
        "help [topic]                   - show help for a command",
    ),
];

/// Deterministic clock advanced only by the session.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimClock {
    now_us: u64,
}

impl SimClock {
    fn advance_ms(&mut self, ms: Millis) {
        self.now_us += u64::from(ms) * 1_000;
    }
}

impl Timebase for SimClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_millis(&self) -> Millis {
        (self.now_us / 1_000) as Millis
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_micros(&self) -> Micros {
        self.now_us as Micros
    }
}

/// Serial link with an in-memory queue in each direction.
#[derive(Debug, Default)]
pub struct HostSerial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SerialLink for HostSerial {
    fn try_read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.push(byte);
    }
}

/// Last value written to each output.
#[derive(Debug, Default)]
pub struct HostActuators {
    pub steering_angle: Option<Degrees>,
    pub drive_pulse_us: Option<Micros>,
    pub left: bool,
    pub right: bool,
}

impl ServoOutput for HostActuators {
    fn write_angle(&mut self, degrees: Degrees) {
        self.steering_angle = Some(degrees);
    }

    fn write_pulse_us(&mut self, pulse_us: Micros) {
        self.drive_pulse_us = Some(pulse_us);
    }
}

impl IndicatorOutput for HostActuators {
    fn set_indicator(&mut self, side: IndicatorSide, on: bool) {
        match side {
            IndicatorSide::Left => self.left = on,
            IndicatorSide::Right => self.right = on,
        }
    }
}

impl ActuatorDriver for HostActuators {
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

/// Whether the session should keep reading input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Simulated vehicle: receiver, serial link, controller and outputs.
pub struct Session {
    controller: RoverController,
    capture: CaptureBank,
    widths: [Micros; CHANNEL_COUNT],
    clock: SimClock,
    scheduler: TickScheduler,
    link: HostSerial,
    actuators: HostActuators,
    last_report: Option<TickReport>,
    debug_frames: bool,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(config: ControlConfig) -> Result<Self, ConfigError> {
        let controller = RoverController::try_new(config)?;
        let clock = SimClock::default();
        Ok(Self {
            capture: CaptureBank::new(config.neutral_pulse_us),
            widths: [config.neutral_pulse_us; CHANNEL_COUNT],
            scheduler: TickScheduler::new(config.tick_interval_ms, clock.now_millis()),
            clock,
            controller,
            link: HostSerial::default(),
            actuators: HostActuators::default(),
            last_report: None,
            debug_frames: false,
            transcript: None,
        })
    }

    /// Prints the controller's debug line after every tick.
    #[must_use]
    pub fn with_debug_frames(mut self, enabled: bool) -> Self {
        self.debug_frames = enabled;
        self
    }

    /// Mirrors every input and output line into a log file.
    pub fn with_transcript(mut self, path: &Path) -> io::Result<Self> {
        self.transcript = Some(TranscriptLogger::new(path)?);
        Ok(self)
    }

    pub fn tick_interval_ms(&self) -> Millis {
        self.scheduler.interval_ms()
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_millis()
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    pub fn actuators(&self) -> &HostActuators {
        &self.actuators
    }

    pub fn controller(&self) -> &RoverController {
        &self.controller
    }

    pub fn width(&self, channel: ChannelId) -> Micros {
        self.widths[channel.as_index()]
    }

    pub fn set_width(&mut self, channel: ChannelId, width_us: Micros) {
        self.widths[channel.as_index()] = width_us;
    }

    pub fn queue_serial(&mut self, bytes: &[u8]) {
        self.link.rx.extend(bytes.iter().copied());
    }

    /// Parses and runs one console line, returning the lines to display.
    pub fn handle_line(&mut self, line: &str) -> io::Result<(Flow, Vec<String>)> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok((Flow::Continue, Vec::new()));
        }

        let now_ms = self.now_ms();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(now_ms, TranscriptRole::Host, trimmed)?;
        }

        let (flow, lines) = match script::parse_line(trimmed) {
            Ok(command) => self.execute(command),
            Err(error) => (Flow::Continue, vec![format!("ERR syntax {error}")]),
        };

        self.record_output(&lines)?;
        Ok((flow, lines))
    }

    fn execute(&mut self, command: ScriptCommand) -> (Flow, Vec<String>) {
        let lines = match command {
            ScriptCommand::Pulse { channel, width_us } => {
                self.set_width(channel, width_us);
                vec![format!("OK {} = {width_us} us", channel.label())]
            }
            ScriptCommand::Send(bytes) => {
                self.queue_serial(&bytes);
                vec![format!("OK queued {} byte(s)", bytes.len())]
            }
            ScriptCommand::Tick(count) => {
                let interval = self.scheduler.interval_ms();
                self.advance(count.saturating_mul(interval))
            }
            ScriptCommand::Advance(ms) => self.advance(ms),
            ScriptCommand::Status => self.status_lines(),
            ScriptCommand::Help(topic) => help_lines(topic.as_deref()),
            ScriptCommand::Exit => return (Flow::Exit, vec!["Session closed.".to_string()]),
        };
        (Flow::Continue, lines)
    }

    /// Moves the clock forward `ms` milliseconds, emitting receiver frames and
    /// running every control tick that falls due. Returns event lines.
    pub fn advance(&mut self, ms: Millis) -> Vec<String> {
        let mut events = Vec::new();
        let mut ticks = 0u32;

        for _ in 0..ms {
            self.clock.advance_ms(1);
            let now_ms = self.clock.now_millis();

            if now_ms % RECEIVER_FRAME_MS == 0 {
                self.emit_receiver_frame();
            }

            if self.scheduler.poll(now_ms) {
                let dropped = self.scheduler.take_dropped();
                self.controller.record_dropped_ticks(dropped, now_ms);
                let report = self.controller.tick(
                    now_ms,
                    self.capture.snapshot(),
                    &mut self.link,
                    &mut self.actuators,
                );
                ticks += 1;

                if let Some(transition) = report.transition {
                    let cause = match transition.cause {
                        TransitionCause::Crossing => "mode switch",
                        TransitionCause::Override => "serial",
                    };
                    events.push(format!(
                        "[{now_ms:>6} ms] mode {} -> {} ({cause})",
                        transition.from, transition.to
                    ));
                }
                if !self.link.tx.is_empty() {
                    events.push(format!(
                        "[{now_ms:>6} ms] serial tx {}",
                        printable(&self.link.tx)
                    ));
                    self.link.tx.clear();
                }
                if self.debug_frames {
                    events.push(format!("[{now_ms:>6} ms] {}", report.debug));
                }
                self.last_report = Some(report);
            }
        }

        events.push(format!(
            "OK t={} ms, {ticks} tick(s) run",
            self.clock.now_millis()
        ));
        events
    }

    /// Synthesizes one rising and one falling edge per channel through the
    /// capture bank, as the receiver interrupts would.
    fn emit_receiver_frame(&mut self) {
        let start_us = self.clock.now_micros();
        for channel in ALL_CHANNELS {
            let width = self.widths[channel.as_index()];
            self.capture.on_edge(channel, EdgeLevel::High, start_us);
            self.capture
                .on_edge(channel, EdgeLevel::Low, start_us.wrapping_add(width));
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let snapshot = self.capture.snapshot();
        lines.push(format!(
            "mode: {}  t={} ms  ticks={}",
            self.controller.mode(),
            self.now_ms(),
            self.controller.ticks()
        ));
        lines.push(format!(
            "receiver: steer={} drive={} mode={} (captured {} / {} / {})",
            self.width(ChannelId::Steering),
            self.width(ChannelId::Drive),
            self.width(ChannelId::ModeSelect),
            snapshot.steering_us,
            snapshot.drive_us,
            snapshot.mode_select_us,
        ));

        match &self.last_report {
            Some(report) => lines.push(report.debug.to_string()),
            None => lines.push("no tick has run yet".to_string()),
        }

        let intent = self.controller.intent();
        lines.push(format!(
            "autonomous intent: angle={} drive={}  ignored bytes={}  pending rx={}",
            intent.steering_angle,
            intent.drive,
            self.controller.ignored_commands(),
            self.link.rx.len()
        ));

        let telemetry = self.controller.telemetry();
        let skip = telemetry.len().saturating_sub(STATUS_TELEMETRY_LINES);
        for record in telemetry.oldest_first().skip(skip) {
            lines.push(format!(
                "  #{:<4} [{:>6} ms] {}",
                record.id, record.timestamp_ms, record.event
            ));
        }
        lines
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let now_ms = self.now_ms();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(now_ms, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => {
            let mut lines = vec![format!("Available commands: {}", help_topic_list())];
            lines.extend(HELP_TOPICS.iter().map(|(_, usage)| (*usage).to_string()));
            lines.push("exit | quit                    - leave the emulator".to_string());
            lines
        }
        Some(topic) => match HELP_TOPICS.iter().find(|(name, _)| *name == topic) {
            Some((_, usage)) => vec![(*usage).to_string()],
            None => vec![format!(
                "ERR unknown topic `{topic}`; try one of: {}",
                help_topic_list()
            )],
        },
    }
}

fn help_topic_list() -> String {
    let mut list = String::new();
    for (index, (name, _)) in HELP_TOPICS.iter().enumerate() {
        if index > 0 {
            list.push_str(", ");
        }
        list.push_str(name);
    }
    list
}

/// Renders serial output with control bytes escaped.
fn printable(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(char::from(byte)),
            other => {
                let _ = write!(out, "\\x{other:02x}");
            }
        }
    }
    out
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Rover controller emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now_ms: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{:>6} ms] {} {}", now_ms, role.prefix(), line)?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy, Debug)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => ">",
            TranscriptRole::Emulator => "<",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(ControlConfig::DEFAULT).expect("default config is valid")
    }

    fn run(session: &mut Session, line: &str) -> Vec<String> {
        let (flow, lines) = session.handle_line(line).expect("no transcript I/O");
        assert_eq!(flow, Flow::Continue);
        lines
    }

    #[test]
    fn manual_stick_reaches_outputs() {
        let mut session = session();
        run(&mut session, "pulse steer 900");
        run(&mut session, "pulse drive 1900");
        run(&mut session, "pulse mode 1000");
        let lines = run(&mut session, "tick 10");

        assert_eq!(lines.last().map(String::as_str), Some("OK t=100 ms, 10 tick(s) run"));
        assert_eq!(session.actuators().steering_angle, Some(45));
        assert_eq!(session.actuators().drive_pulse_us, Some(1560));
    }

    #[test]
    fn serial_force_is_reported_once() {
        let mut session = session();
        run(&mut session, "pulse mode 1000");
        run(&mut session, "send aaR");
        let lines = run(&mut session, "tick 3");

        let mode_changes = lines
            .iter()
            .filter(|line| line.contains("mode manual -> autonomous"))
            .count();
        assert_eq!(mode_changes, 1);
        assert!(lines.iter().any(|line| line.ends_with("serial tx a")));
        assert_eq!(session.actuators().steering_angle, Some(45));
    }

    #[test]
    fn mode_switch_flip_toggles_through_capture() {
        let mut session = session();
        run(&mut session, "pulse mode 1000");
        run(&mut session, "tick 5");
        run(&mut session, "pulse mode 2000");
        let lines = run(&mut session, "advance 50");

        assert!(lines.iter().any(|line| line.contains("(mode switch)")));
        assert!(session.controller().mode().is_autonomous());
    }

    #[test]
    fn syntax_errors_are_reported_not_fatal() {
        let mut session = session();
        let lines = run(&mut session, "pulse wheel 5");
        assert!(lines[0].starts_with("ERR syntax"));
        let lines = run(&mut session, "help tick");
        assert_eq!(lines.len(), 1);
        let (flow, _) = session.handle_line("exit").expect("no transcript I/O");
        assert_eq!(flow, Flow::Exit);
    }

    #[test]
    fn debug_frames_stay_off_the_serial_link() {
        let mut session = session().with_debug_frames(true);
        run(&mut session, "send a");
        let lines = run(&mut session, "tick 3");

        let serial: Vec<&String> = lines.iter().filter(|line| line.contains("serial tx")).collect();
        assert_eq!(serial.len(), 1);
        assert!(serial[0].ends_with("serial tx a"));
        let frames = lines.iter().filter(|line| line.contains("CH1: ")).count();
        assert_eq!(frames, 3);
    }

    #[test]
    fn status_includes_debug_frame() {
        let mut session = session();
        run(&mut session, "tick");
        let lines = run(&mut session, "status");
        assert!(lines.iter().any(|line| line.starts_with("CH1: ")));
    }

    #[test]
    fn printable_escapes_control_bytes() {
        assert_eq!(printable(b"a\r\n\x01"), "a\\r\\n\\x01");
    }
}
