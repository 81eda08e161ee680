//! Telemetry ring and debug line shared by firmware and host targets.
//!
//! The controller records noteworthy events (mode changes, command handling,
//! dropped ticks) into a fixed-capacity [`HistoryBuf`] so the most recent
//! history is available for inspection without allocation. [`DebugFrame`] is
//! the human-readable per-tick line; it is diagnostic only.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::control::command::Command;
use crate::control::mode::{Mode, TransitionCause};
use crate::output::ActuatorFrame;
use crate::{Micros, Millis};

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Default number of records retained.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Events worth remembering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    ModeEntered { mode: Mode, cause: TransitionCause },
    CommandApplied(Command),
    /// Unrecognized byte, or a control symbol received in manual mode.
    CommandIgnored(u8),
    /// Scheduler polls found this many ticks late since the last record.
    TicksDropped(u32),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ModeEntered { mode, cause } => {
                let cause = match cause {
                    TransitionCause::Crossing => "switch",
                    TransitionCause::Override => "serial",
                };
                write!(f, "mode-entered {mode} via {cause}")
            }
            TelemetryEventKind::CommandApplied(command) => {
                write!(f, "command-applied '{}'", char::from(command.as_byte()))
            }
            TelemetryEventKind::CommandIgnored(byte) => write!(f, "command-ignored 0x{byte:02x}"),
            TelemetryEventKind::TicksDropped(count) => write!(f, "ticks-dropped {count}"),
        }
    }
}

/// Record stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp_ms: Millis,
    pub event: TelemetryEventKind,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Appends an event, evicting the oldest record when full.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp_ms: Millis) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            timestamp_ms,
            event,
        });
        id
    }

    /// Records in chronological order.
    #[must_use]
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Total events recorded, including evicted ones.
    #[must_use]
    pub const fn total_recorded(&self) -> EventId {
        self.next_event_id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-tick diagnostic line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DebugFrame {
    pub mode: Mode,
    pub steering_filtered_us: Micros,
    pub drive_filtered_us: Micros,
    pub mode_select_us: Micros,
    pub frame: ActuatorFrame,
}

impl fmt::Display for DebugFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CH1: {} | CH2: {} | MODE: {} | FrontAngle: {} | Drive: {} ({}) | LED: {}{} | {}",
            self.steering_filtered_us,
            self.drive_filtered_us,
            self.mode_select_us,
            self.frame.steering_angle,
            self.frame.drive_pulse_us,
            self.frame.drive,
            if self.frame.indicators.left { 'L' } else { '-' },
            if self.frame.indicators.right { 'R' } else { '-' },
            self.mode,
        )
    }
}
