//! Raw-mode keyboard console.
//!
//! Printable keys go straight onto the serial link as command bytes. Arrow
//! keys move the simulated sticks and Tab flips the mode switch. The clock
//! runs in real time at the controller tick rate.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use rover_core::Micros;
use rover_core::capture::ChannelId;

use crate::session::Session;

const STICK_STEP_US: Micros = 50;
const STICK_MIN_US: Micros = 800;
const STICK_MAX_US: Micros = 2200;
const SWITCH_LOW_US: Micros = 1000;
const SWITCH_HIGH_US: Micros = 2000;

const KEY_HELP: &str = "keys: a/n mode, L l s r R steer, f b x drive, \
arrows move sticks, Tab flips mode switch, Esc quits";

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum KeyAction {
    Continue,
    Quit,
}

pub fn run(session: &mut Session) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{KEY_HELP}")?;

    let _raw = RawModeGuard::enable()?;
    let interval_ms = session.tick_interval_ms();
    let interval = Duration::from_millis(u64::from(interval_ms));
    let mut next_tick = Instant::now() + interval;

    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                if let KeyAction::Quit = handle_key(session, key) {
                    break;
                }
            }
            continue;
        }

        next_tick += interval;
        for line in session.advance(interval_ms) {
            if line.starts_with("OK ") {
                continue;
            }
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            write!(out, "{line}\r\n")?;
        }

        if let Some(report) = session.last_report() {
            queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            write!(out, "{}", report.debug)?;
        }
        out.flush()?;
    }

    write!(out, "\r\n")?;
    out.flush()
}

fn handle_key(session: &mut Session, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Esc => return KeyAction::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return KeyAction::Quit;
        }
        KeyCode::Left => nudge(session, ChannelId::Steering, true),
        KeyCode::Right => nudge(session, ChannelId::Steering, false),
        KeyCode::Up => nudge(session, ChannelId::Drive, true),
        KeyCode::Down => nudge(session, ChannelId::Drive, false),
        KeyCode::Tab => {
            let flipped = if session.width(ChannelId::ModeSelect) > SWITCH_LOW_US {
                SWITCH_LOW_US
            } else {
                SWITCH_HIGH_US
            };
            session.set_width(ChannelId::ModeSelect, flipped);
        }
        KeyCode::Enter => session.queue_serial(b"\n"),
        KeyCode::Char(ch) if ch.is_ascii() => {
            let mut buffer = [0u8; 1];
            ch.encode_utf8(&mut buffer);
            session.queue_serial(&buffer);
        }
        _ => {}
    }
    KeyAction::Continue
}

/// Steering left and drive forward both mean a longer pulse.
fn nudge(session: &mut Session, channel: ChannelId, increase: bool) {
    let width = session.width(channel);
    let next = if increase {
        width.saturating_add(STICK_STEP_US).min(STICK_MAX_US)
    } else {
        width.saturating_sub(STICK_STEP_US).max(STICK_MIN_US)
    };
    session.set_width(channel, next);
}
