//! Line grammar for the emulator console.
//!
//! ```text
//! pulse <steer|drive|mode> <us>   set the width the receiver emits
//! send <bytes>                    queue bytes on the serial link (\n, \r, \\, \xNN escapes)
//! tick [n]                        run n control ticks (default 1)
//! advance <ms>                    advance the simulated clock
//! status                          show the last frame and controller state
//! help [topic]
//! exit | quit
//! ```

use std::fmt;

use rover_core::capture::ChannelId;
use rover_core::{Micros, Millis};
use winnow::ascii::{Caseless, alphanumeric1, dec_uint, space0, space1};
use winnow::combinator::{alt, cut_err, eof, opt, preceded, terminated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::rest;

/// One parsed console line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScriptCommand {
    Pulse { channel: ChannelId, width_us: Micros },
    Send(Vec<u8>),
    Tick(u32),
    Advance(Millis),
    Status,
    Help(Option<String>),
    Exit,
}

/// Console line that failed to parse.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "unrecognized input at column {}", self.offset + 1)
        } else {
            write!(f, "column {}: {}", self.offset + 1, self.message.replace('\n', "; "))
        }
    }
}

impl std::error::Error for ScriptError {}

/// Parses a single line, ignoring surrounding whitespace.
pub fn parse_line(line: &str) -> Result<ScriptCommand, ScriptError> {
    command.parse(line.trim()).map_err(|error| ScriptError {
        offset: error.offset(),
        message: error.inner().to_string(),
    })
}

fn command(input: &mut &str) -> ModalResult<ScriptCommand> {
    alt((
        send,
        terminated(
            alt((pulse, tick, advance, status, help, exit)),
            (space0, eof),
        ),
    ))
    .parse_next(input)
}

fn pulse(input: &mut &str) -> ModalResult<ScriptCommand> {
    preceded(
        (Caseless("pulse"), space1),
        cut_err((channel, preceded(space1, width))),
    )
    .map(|(channel, width_us)| ScriptCommand::Pulse { channel, width_us })
    .parse_next(input)
}

fn channel(input: &mut &str) -> ModalResult<ChannelId> {
    alt((
        alt((Caseless("steering"), Caseless("steer"), Caseless("ch1"))).value(ChannelId::Steering),
        alt((Caseless("drive"), Caseless("ch2"))).value(ChannelId::Drive),
        alt((Caseless("mode"), Caseless("ch3"))).value(ChannelId::ModeSelect),
    ))
    .context(StrContext::Label("channel"))
    .context(StrContext::Expected(StrContextValue::Description(
        "steer, drive or mode",
    )))
    .parse_next(input)
}

fn width(input: &mut &str) -> ModalResult<Micros> {
    dec_uint::<_, Micros, _>
        .context(StrContext::Label("pulse width"))
        .context(StrContext::Expected(StrContextValue::Description(
            "microseconds",
        )))
        .parse_next(input)
}

fn send(input: &mut &str) -> ModalResult<ScriptCommand> {
    preceded((Caseless("send"), space1), rest)
        .map(|payload: &str| ScriptCommand::Send(unescape(payload)))
        .parse_next(input)
}

fn tick(input: &mut &str) -> ModalResult<ScriptCommand> {
    preceded(
        Caseless("tick"),
        opt(preceded(space1, dec_uint::<_, u32, _>)),
    )
    .map(|count| ScriptCommand::Tick(count.unwrap_or(1)))
    .parse_next(input)
}

fn advance(input: &mut &str) -> ModalResult<ScriptCommand> {
    preceded(
        (Caseless("advance"), space1),
        cut_err(dec_uint::<_, Millis, _>)
            .context(StrContext::Expected(StrContextValue::Description("milliseconds"))),
    )
    .map(ScriptCommand::Advance)
    .parse_next(input)
}

fn status(input: &mut &str) -> ModalResult<ScriptCommand> {
    Caseless("status").value(ScriptCommand::Status).parse_next(input)
}

fn help(input: &mut &str) -> ModalResult<ScriptCommand> {
    preceded(Caseless("help"), opt(preceded(space1, alphanumeric1)))
        .map(|topic: Option<&str>| ScriptCommand::Help(topic.map(str::to_ascii_lowercase)))
        .parse_next(input)
}

fn exit(input: &mut &str) -> ModalResult<ScriptCommand> {
    alt((Caseless("exit"), Caseless("quit")))
        .value(ScriptCommand::Exit)
        .parse_next(input)
}

/// Expands `\n`, `\r`, `\\` and `\xNN`; anything else is taken literally.
fn unescape(payload: &str) -> Vec<u8> {
    let bytes = payload.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let byte = bytes[index];
        if byte != b'\\' || index + 1 == bytes.len() {
            out.push(byte);
            index += 1;
            continue;
        }

        match bytes[index + 1] {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b'\\' => out.push(b'\\'),
            b'x' => {
                let hex = payload.get(index + 2..index + 4);
                if let Some(value) = hex.and_then(|hex| u8::from_str_radix(hex, 16).ok()) {
                    out.push(value);
                    index += 4;
                    continue;
                }
                out.extend_from_slice(b"\\x");
            }
            other => out.extend_from_slice(&[b'\\', other]),
        }
        index += 2;
    }
    out
}
