//! Fixed-rate tick gating over an injectable timebase.
//!
//! The scheduler never queues work: when the caller polls late, exactly one
//! tick runs and the missed ones are counted and dropped. Timestamps are
//! compared with wrapping subtraction so the free-running millisecond counter
//! may overflow.

use crate::{Micros, Millis};

/// Monotonic, free-running counters.
pub trait Timebase {
    fn now_millis(&self) -> Millis;
    fn now_micros(&self) -> Micros;
}

/// Decides when the next control tick is due.
#[derive(Clone, Debug)]
pub struct TickScheduler {
    interval_ms: Millis,
    last_run_ms: Millis,
    dropped: u32,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is due `interval_ms` after
    /// `start_ms`.
    #[must_use]
    pub const fn new(interval_ms: Millis, start_ms: Millis) -> Self {
        Self {
            interval_ms,
            last_run_ms: start_ms,
            dropped: 0,
        }
    }

    #[must_use]
    pub const fn interval_ms(&self) -> Millis {
        self.interval_ms
    }

    /// Returns `true` when a tick should run at `now_ms`, and if so marks it
    /// as run.
    pub fn poll(&mut self, now_ms: Millis) -> bool {
        let elapsed = now_ms.wrapping_sub(self.last_run_ms);
        if elapsed < self.interval_ms {
            return false;
        }

        if self.interval_ms > 0 {
            let missed = elapsed / self.interval_ms - 1;
            self.dropped = self.dropped.saturating_add(missed);
        }
        self.last_run_ms = now_ms;
        true
    }

    /// Milliseconds until the next tick is due (zero when overdue).
    #[must_use]
    pub const fn time_until_due(&self, now_ms: Millis) -> Millis {
        let elapsed = now_ms.wrapping_sub(self.last_run_ms);
        self.interval_ms.saturating_sub(elapsed)
    }

    /// Returns and clears the number of ticks skipped because polls were late.
    pub fn take_dropped(&mut self) -> u32 {
        core::mem::take(&mut self.dropped)
    }
}
