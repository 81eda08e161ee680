//! Pulse-width capture for the receiver channels.
//!
//! Each receiver output is a pulse whose high time encodes the stick position.
//! The edge handlers run in interrupt context and do a handful of integer
//! operations: stamp the rising edge, and on the following falling edge
//! publish `now - start` as the channel's width. The control loop never reads
//! the live channel state directly; it takes a [`CaptureSnapshot`] through
//! [`CaptureBank::snapshot`], which copies every width inside one critical
//! section so a half-written update is never observed.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::Micros;

/// Number of receiver channels monitored by the capture bank.
pub const CHANNEL_COUNT: usize = 3;

/// Receiver input lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChannelId {
    Steering,
    Drive,
    ModeSelect,
}

impl ChannelId {
    /// Deterministic index into per-channel arrays.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ChannelId::Steering => 0,
            ChannelId::Drive => 1,
            ChannelId::ModeSelect => 2,
        }
    }

    /// Attempts to construct a [`ChannelId`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ChannelId::Steering),
            1 => Some(ChannelId::Drive),
            2 => Some(ChannelId::ModeSelect),
            _ => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ChannelId::Steering => "steer",
            ChannelId::Drive => "drive",
            ChannelId::ModeSelect => "mode",
        }
    }
}

/// Every channel, in index order.
pub const ALL_CHANNELS: [ChannelId; CHANNEL_COUNT] =
    [ChannelId::Steering, ChannelId::Drive, ChannelId::ModeSelect];

/// Logical level sampled by the edge handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeLevel {
    High,
    Low,
}

impl EdgeLevel {
    #[must_use]
    pub const fn from_high(high: bool) -> Self {
        if high { EdgeLevel::High } else { EdgeLevel::Low }
    }
}

/// Capture state for one receiver line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CaptureChannel {
    pulse_us: Micros,
    started_at: Option<Micros>,
    level: EdgeLevel,
}

impl CaptureChannel {
    /// Creates a channel that reports `initial_pulse_us` until the first
    /// complete pulse is measured.
    #[must_use]
    pub const fn new(initial_pulse_us: Micros) -> Self {
        Self {
            pulse_us: initial_pulse_us,
            started_at: None,
            level: EdgeLevel::Low,
        }
    }

    /// Handles one edge. Returns the new width when a pulse completes.
    ///
    /// A falling edge with no pending start stamp is dropped. Widths are not
    /// range-checked here; the output stage clamps them.
    pub fn on_edge(&mut self, level: EdgeLevel, now_us: Micros) -> Option<Micros> {
        self.level = level;
        match level {
            EdgeLevel::High => {
                self.started_at = Some(now_us);
                None
            }
            EdgeLevel::Low => {
                let started_at = self.started_at.take()?;
                let width = now_us.wrapping_sub(started_at);
                self.pulse_us = width;
                Some(width)
            }
        }
    }

    /// Most recently completed pulse width.
    #[must_use]
    pub const fn pulse_us(&self) -> Micros {
        self.pulse_us
    }

    /// Level seen on the last edge.
    #[must_use]
    pub const fn level(&self) -> EdgeLevel {
        self.level
    }

    /// `true` between a rising edge and its falling edge.
    #[must_use]
    pub const fn is_measuring(&self) -> bool {
        self.started_at.is_some()
    }
}

/// Widths of every channel copied out in one critical section.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CaptureSnapshot {
    pub steering_us: Micros,
    pub drive_us: Micros,
    pub mode_select_us: Micros,
}

impl CaptureSnapshot {
    /// Snapshot with every channel at the same width.
    #[must_use]
    pub const fn uniform(width_us: Micros) -> Self {
        Self {
            steering_us: width_us,
            drive_us: width_us,
            mode_select_us: width_us,
        }
    }

    #[must_use]
    pub const fn get(&self, channel: ChannelId) -> Micros {
        match channel {
            ChannelId::Steering => self.steering_us,
            ChannelId::Drive => self.drive_us,
            ChannelId::ModeSelect => self.mode_select_us,
        }
    }
}

/// Interrupt-shared capture state for all receiver channels.
///
/// Intended to live in a `static`; edge handlers call [`CaptureBank::on_edge`]
/// and the control loop calls [`CaptureBank::snapshot`].
pub struct CaptureBank {
    channels: Mutex<RefCell<[CaptureChannel; CHANNEL_COUNT]>>,
}

impl CaptureBank {
    /// Creates a bank whose channels all start at `neutral_us`.
    #[must_use]
    pub const fn new(neutral_us: Micros) -> Self {
        Self {
            channels: Mutex::new(RefCell::new([CaptureChannel::new(neutral_us); CHANNEL_COUNT])),
        }
    }

    /// Edge handler entry point.
    pub fn on_edge(&self, channel: ChannelId, level: EdgeLevel, now_us: Micros) -> Option<Micros> {
        critical_section::with(|cs| {
            self.channels.borrow_ref_mut(cs)[channel.as_index()].on_edge(level, now_us)
        })
    }

    /// Copies every channel's width atomically with respect to the handlers.
    pub fn snapshot(&self) -> CaptureSnapshot {
        critical_section::with(|cs| {
            let channels = self.channels.borrow_ref(cs);
            CaptureSnapshot {
                steering_us: channels[ChannelId::Steering.as_index()].pulse_us(),
                drive_us: channels[ChannelId::Drive.as_index()].pulse_us(),
                mode_select_us: channels[ChannelId::ModeSelect.as_index()].pulse_us(),
            }
        })
    }

    /// Copies the full state of a single channel.
    pub fn channel(&self, channel: ChannelId) -> CaptureChannel {
        critical_section::with(|cs| self.channels.borrow_ref(cs)[channel.as_index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_edge_publishes_elapsed_width() {
        let mut channel = CaptureChannel::new(1500);
        assert_eq!(channel.on_edge(EdgeLevel::High, 10_000), None);
        assert!(channel.is_measuring());
        assert_eq!(channel.on_edge(EdgeLevel::Low, 11_200), Some(1_200));
        assert_eq!(channel.pulse_us(), 1_200);
        assert!(!channel.is_measuring());
    }

    #[test]
    fn falling_edge_without_start_is_ignored() {
        let mut channel = CaptureChannel::new(1500);
        assert_eq!(channel.on_edge(EdgeLevel::Low, 4_000), None);
        assert_eq!(channel.pulse_us(), 1500);
        assert_eq!(channel.level(), EdgeLevel::Low);

        channel.on_edge(EdgeLevel::High, 5_000);
        channel.on_edge(EdgeLevel::Low, 6_900);
        // Second falling edge has no start marker any more.
        assert_eq!(channel.on_edge(EdgeLevel::Low, 9_000), None);
        assert_eq!(channel.pulse_us(), 1_900);
    }

    #[test]
    fn width_survives_timer_wraparound() {
        let mut channel = CaptureChannel::new(1500);
        channel.on_edge(EdgeLevel::High, u32::MAX - 499);
        assert_eq!(channel.on_edge(EdgeLevel::Low, 1_000), Some(1_500));
    }

    #[test]
    fn repeated_rising_edge_restarts_measurement() {
        let mut channel = CaptureChannel::new(1500);
        channel.on_edge(EdgeLevel::High, 100);
        channel.on_edge(EdgeLevel::High, 300);
        assert_eq!(channel.on_edge(EdgeLevel::Low, 1_300), Some(1_000));
    }

    #[test]
    fn implausible_widths_propagate() {
        let mut channel = CaptureChannel::new(1500);
        channel.on_edge(EdgeLevel::High, 7);
        assert_eq!(channel.on_edge(EdgeLevel::Low, 7), Some(0));
        assert_eq!(channel.pulse_us(), 0);
    }

    #[test]
    fn bank_snapshot_copies_each_channel() {
        let bank = CaptureBank::new(1500);
        assert_eq!(bank.snapshot(), CaptureSnapshot::uniform(1500));

        bank.on_edge(ChannelId::Steering, EdgeLevel::High, 0);
        bank.on_edge(ChannelId::Drive, EdgeLevel::High, 50);
        bank.on_edge(ChannelId::Steering, EdgeLevel::Low, 900);
        // Drive pulse still in flight; its published width is unchanged.
        let snapshot = bank.snapshot();
        assert_eq!(snapshot.steering_us, 900);
        assert_eq!(snapshot.drive_us, 1500);
        assert_eq!(snapshot.get(ChannelId::ModeSelect), 1500);
        assert!(bank.channel(ChannelId::Drive).is_measuring());

        bank.on_edge(ChannelId::Drive, EdgeLevel::Low, 1_950);
        assert_eq!(bank.snapshot().drive_us, 1_900);
    }

    #[test]
    fn channel_index_round_trips() {
        for channel in ALL_CHANNELS {
            assert_eq!(ChannelId::from_index(channel.as_index()), Some(channel));
        }
        assert_eq!(ChannelId::from_index(CHANNEL_COUNT), None);
    }
}
