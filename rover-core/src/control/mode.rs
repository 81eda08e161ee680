//! Manual/autonomous mode state machine.
//!
//! Two sources change the mode: a crossing of the mode-select channel over the
//! neutral threshold between consecutive ticks (a toggle), and explicit force
//! commands from the serial link. Transitions are bracketed by
//! [`ModeController::begin_tick`] and [`ModeController::finish_tick`] so the
//! outside world hears about a change at most once per tick.

use core::fmt;

use crate::Micros;

/// Control authority.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Mode {
    /// Steering and drive follow the receiver.
    #[default]
    Manual,
    /// Steering and drive follow serial commands.
    Autonomous,
}

impl Mode {
    /// Byte written to the serial link when this mode is entered.
    #[must_use]
    pub const fn status_byte(self) -> u8 {
        match self {
            Mode::Manual => b'n',
            Mode::Autonomous => b'a',
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Mode::Manual => Mode::Autonomous,
            Mode::Autonomous => Mode::Manual,
        }
    }

    #[must_use]
    pub const fn is_autonomous(self) -> bool {
        matches!(self, Mode::Autonomous)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Manual => f.write_str("manual"),
            Mode::Autonomous => f.write_str("autonomous"),
        }
    }
}

/// What caused a mode change.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransitionCause {
    /// Mode-select channel crossed the threshold.
    Crossing,
    /// Force command received on the serial link.
    Override,
}

/// Mode change reported once per tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
    /// Cause of the last change applied during the tick.
    pub cause: TransitionCause,
}

/// Tracks the current mode and the previous mode-select sample.
#[derive(Clone, Debug)]
pub struct ModeController {
    mode: Mode,
    threshold_us: Micros,
    previous_select_us: Micros,
    mode_at_tick_start: Mode,
    last_cause: Option<TransitionCause>,
}

impl ModeController {
    /// Starts in [`Mode::Manual`]. The previous mode-select sample is seeded
    /// with the threshold itself, the width the capture channel reports before
    /// any pulse arrives.
    #[must_use]
    pub const fn new(threshold_us: Micros) -> Self {
        Self {
            mode: Mode::Manual,
            threshold_us,
            previous_select_us: threshold_us,
            mode_at_tick_start: Mode::Manual,
            last_cause: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Mode-select width seen on the previous tick.
    #[must_use]
    pub const fn previous_select_us(&self) -> Micros {
        self.previous_select_us
    }

    /// Marks the start of a tick.
    pub fn begin_tick(&mut self) {
        self.mode_at_tick_start = self.mode;
        self.last_cause = None;
    }

    /// Compares `select_us` with the previous tick's sample and toggles the
    /// mode when they sit on opposite sides of the threshold. Returns `true`
    /// when a toggle happened.
    pub fn observe_select(&mut self, select_us: Micros) -> bool {
        let was_high = self.previous_select_us > self.threshold_us;
        let is_high = select_us > self.threshold_us;
        self.previous_select_us = select_us;

        if was_high == is_high {
            return false;
        }

        self.mode = self.mode.toggled();
        self.last_cause = Some(TransitionCause::Crossing);
        true
    }

    /// Forces `target` unless it is already the current mode. Returns `true`
    /// when the mode changed.
    pub fn force(&mut self, target: Mode) -> bool {
        if self.mode == target {
            return false;
        }

        self.mode = target;
        self.last_cause = Some(TransitionCause::Override);
        true
    }

    /// Closes the tick, reporting a transition when the mode now differs from
    /// the mode the tick started in.
    pub fn finish_tick(&mut self) -> Option<ModeTransition> {
        let from = self.mode_at_tick_start;
        self.mode_at_tick_start = self.mode;
        let cause = self.last_cause.take()?;

        (from != self.mode).then_some(ModeTransition {
            from,
            to: self.mode,
            cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_tick(controller: &mut ModeController, select_us: Micros) -> Option<ModeTransition> {
        controller.begin_tick();
        controller.observe_select(select_us);
        controller.finish_tick()
    }

    #[test]
    fn starts_manual() {
        let controller = ModeController::new(1500);
        assert_eq!(controller.mode(), Mode::Manual);
        assert_eq!(controller.previous_select_us(), 1500);
    }

    #[test]
    fn crossing_in_either_direction_toggles() {
        let mut controller = ModeController::new(1500);
        let mut toggles = 0;
        for select in [1400, 1600, 1600, 1400] {
            if run_tick(&mut controller, select).is_some() {
                toggles += 1;
            }
        }
        // 1400 -> 1600 and 1600 -> 1400.
        assert_eq!(toggles, 2);
        assert_eq!(controller.mode(), Mode::Manual);
    }

    #[test]
    fn holding_one_side_never_retriggers() {
        let mut controller = ModeController::new(1500);
        for select in [1400, 1000, 1500, 1200] {
            assert_eq!(run_tick(&mut controller, select), None);
        }

        let transition = run_tick(&mut controller, 1900).expect("crossing expected");
        assert_eq!(transition.to, Mode::Autonomous);
        assert_eq!(transition.cause, TransitionCause::Crossing);
        for select in [1900, 1600, 2000] {
            assert_eq!(run_tick(&mut controller, select), None);
        }
        assert_eq!(controller.mode(), Mode::Autonomous);
    }

    #[test]
    fn threshold_itself_counts_as_low() {
        let mut controller = ModeController::new(1500);
        assert_eq!(run_tick(&mut controller, 1501).map(|t| t.to), Some(Mode::Autonomous));
        assert_eq!(run_tick(&mut controller, 1500).map(|t| t.to), Some(Mode::Manual));
    }

    #[test]
    fn force_reasserting_current_mode_is_noop() {
        let mut controller = ModeController::new(1500);
        controller.begin_tick();
        assert!(!controller.force(Mode::Manual));
        assert_eq!(controller.finish_tick(), None);

        controller.begin_tick();
        assert!(controller.force(Mode::Autonomous));
        assert!(!controller.force(Mode::Autonomous));
        let transition = controller.finish_tick().expect("transition expected");
        assert_eq!(transition.from, Mode::Manual);
        assert_eq!(transition.to, Mode::Autonomous);
        assert_eq!(transition.cause, TransitionCause::Override);

        controller.begin_tick();
        assert!(!controller.force(Mode::Autonomous));
        assert_eq!(controller.finish_tick(), None);
    }

    #[test]
    fn at_most_one_transition_per_tick() {
        let mut controller = ModeController::new(1500);
        controller.begin_tick();
        controller.observe_select(1700);
        controller.force(Mode::Manual);
        // Mode ends where it started; nothing to announce.
        assert_eq!(controller.finish_tick(), None);

        controller.begin_tick();
        assert!(controller.observe_select(1400));
        assert!(controller.force(Mode::Manual));
        assert!(controller.force(Mode::Autonomous));
        let transition = controller.finish_tick().expect("single transition");
        assert_eq!(transition.from, Mode::Manual);
        assert_eq!(transition.to, Mode::Autonomous);
        assert_eq!(transition.cause, TransitionCause::Override);
        assert_eq!(controller.finish_tick(), None);
    }

    #[test]
    fn status_bytes() {
        assert_eq!(Mode::Autonomous.status_byte(), b'a');
        assert_eq!(Mode::Manual.status_byte(), b'n');
    }
}
