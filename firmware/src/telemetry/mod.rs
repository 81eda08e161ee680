//! Log sinks for controller telemetry.
//!
//! The controller keeps its own ring of events; this module drains the records
//! that appeared since the last call and mirrors them to defmt on the target
//! (stdout on the host) for quick inspection during bring-up.

#![allow(dead_code)]

use rover_core::telemetry::{DebugFrame, EventId, TelemetryRecord, TelemetryRecorder};

use crate::status::StatusSnapshot;

/// Remembers which records have already been logged.
pub struct TelemetryCursor {
    next_id: EventId,
}

impl TelemetryCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self { next_id: 0 }
    }

    /// Logs every record newer than the cursor and advances it. Records evicted
    /// from the ring before this call are skipped silently.
    pub fn flush<const CAPACITY: usize>(&mut self, recorder: &TelemetryRecorder<CAPACITY>) -> usize {
        let mut logged = 0;
        for record in recorder.oldest_first() {
            if record.id.wrapping_sub(self.next_id) < EventId::MAX / 2 {
                emit_record(record);
                self.next_id = record.id.wrapping_add(1);
                logged += 1;
            }
        }
        logged
    }
}

impl Default for TelemetryCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord) {
    defmt::info!(
        "telemetry #{} t={}ms {}",
        record.id,
        record.timestamp_ms,
        defmt::Display2Format(&record.event)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord) {
    println!(
        "telemetry #{} t={}ms {}",
        record.id, record.timestamp_ms, record.event
    );
}

#[cfg(target_os = "none")]
pub fn emit_debug_frame(frame: &DebugFrame) {
    defmt::debug!("{}", defmt::Display2Format(frame));
}

#[cfg(not(target_os = "none"))]
pub fn emit_debug_frame(frame: &DebugFrame) {
    println!("{frame}");
}

#[cfg(target_os = "none")]
pub fn emit_status(status: &StatusSnapshot) {
    defmt::info!(
        "status: mode={} ticks={} dropped={} rx_overflow={} tx_dropped={}",
        defmt::Display2Format(&status.mode),
        status.ticks_run,
        status.ticks_dropped,
        status.rx_overflow,
        status.tx_dropped
    );
}

#[cfg(not(target_os = "none"))]
pub fn emit_status(status: &StatusSnapshot) {
    println!(
        "status: mode={} ticks={} dropped={} rx_overflow={} tx_dropped={}",
        status.mode, status.ticks_run, status.ticks_dropped, status.rx_overflow, status.tx_dropped
    );
}

#[cfg(test)]
mod tests {
    use rover_core::control::mode::{Mode, TransitionCause};
    use rover_core::telemetry::TelemetryEventKind;

    use super::*;

    #[test]
    fn cursor_logs_each_record_once() {
        let mut recorder = TelemetryRecorder::<4>::new();
        let mut cursor = TelemetryCursor::new();
        assert_eq!(cursor.flush(&recorder), 0);

        recorder.record(TelemetryEventKind::CommandIgnored(b'?'), 10);
        recorder.record(
            TelemetryEventKind::ModeEntered {
                mode: Mode::Autonomous,
                cause: TransitionCause::Override,
            },
            20,
        );
        assert_eq!(cursor.flush(&recorder), 2);
        assert_eq!(cursor.flush(&recorder), 0);

        recorder.record(TelemetryEventKind::TicksDropped(3), 30);
        assert_eq!(cursor.flush(&recorder), 1);
    }

    #[test]
    fn cursor_skips_evicted_records() {
        let mut recorder = TelemetryRecorder::<2>::new();
        let mut cursor = TelemetryCursor::new();
        for timestamp in 0..5 {
            recorder.record(TelemetryEventKind::TicksDropped(1), timestamp);
        }
        assert_eq!(cursor.flush(&recorder), 2);
        assert_eq!(cursor.flush(&recorder), 0);
    }
}
