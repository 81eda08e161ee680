//! Fixed-window moving average over receiver captures.
//!
//! Every filtered channel keeps the last `WINDOW` raw widths in a
//! [`HistoryBuf`] pre-filled with the neutral width, so the filter reads
//! centered before real data arrives. All channels are advanced together by a
//! single [`FilterBank::update`] call per tick; no channel can drift ahead of
//! another.

use heapless::HistoryBuf;

use crate::Micros;

/// Window length used by the controller.
pub const FILTER_WINDOW: usize = 5;

/// Lock-step moving-average filters for `CHANNELS` inputs.
pub struct FilterBank<const CHANNELS: usize, const WINDOW: usize = FILTER_WINDOW> {
    rings: [HistoryBuf<Micros, WINDOW>; CHANNELS],
}

impl<const CHANNELS: usize, const WINDOW: usize> FilterBank<CHANNELS, WINDOW> {
    /// Creates a bank with every slot holding `fill_us`.
    #[must_use]
    pub fn new(fill_us: Micros) -> Self {
        Self {
            rings: core::array::from_fn(|_| HistoryBuf::new_with(fill_us)),
        }
    }

    /// Inserts one raw sample per channel, evicting the oldest, and returns
    /// the truncated mean of each window.
    pub fn update(&mut self, samples: [Micros; CHANNELS]) -> [Micros; CHANNELS] {
        for (ring, sample) in self.rings.iter_mut().zip(samples) {
            ring.write(sample);
        }
        self.averages()
    }

    /// Current mean of each window without inserting anything.
    #[must_use]
    pub fn averages(&self) -> [Micros; CHANNELS] {
        core::array::from_fn(|index| mean(&self.rings[index]))
    }

    /// Raw window contents for one channel, oldest first.
    pub fn window(&self, channel: usize) -> impl Iterator<Item = &Micros> {
        self.rings[channel].oldest_ordered()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn mean<const WINDOW: usize>(ring: &HistoryBuf<Micros, WINDOW>) -> Micros {
    let slots = ring.as_slice();
    if slots.is_empty() {
        return 0;
    }
    let sum: u64 = slots.iter().map(|&value| u64::from(value)).sum();
    (sum / slots.len() as u64) as Micros
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_neutral_before_any_sample() {
        let bank = FilterBank::<2>::new(1500);
        assert_eq!(bank.averages(), [1500, 1500]);
    }

    #[test]
    fn mean_includes_prefilled_history() {
        let mut bank = FilterBank::<1>::new(1500);
        // (4 * 1500 + 1000) / 5
        assert_eq!(bank.update([1000]), [1400]);
        // (3 * 1500 + 2 * 1000) / 5
        assert_eq!(bank.update([1000]), [1300]);
    }

    #[test]
    fn mean_tracks_exactly_last_window() {
        let mut bank = FilterBank::<1>::new(1500);
        let inputs = [1000, 1100, 1200, 1300, 1400, 2000, 0, 1234];
        let mut last = [0];
        for value in inputs {
            last = bank.update([value]);
        }
        let expected = (1300 + 1400 + 2000 + 1234) / 5;
        assert_eq!(last, [expected]);
        let window: heapless::Vec<Micros, 5> = bank.window(0).copied().collect();
        assert_eq!(window.as_slice(), &[1300, 1400, 2000, 0, 1234]);
    }

    #[test]
    fn mean_truncates() {
        let mut bank = FilterBank::<1>::new(0);
        assert_eq!(bank.update([9]), [1]);
        assert_eq!(bank.update([0]), [1]);
        assert_eq!(bank.update([0]), [1]);
        assert_eq!(bank.update([0]), [1]);
        assert_eq!(bank.update([0]), [1]);
        assert_eq!(bank.update([0]), [0]);
    }

    #[test]
    fn channels_advance_in_lock_step() {
        let mut bank = FilterBank::<2>::new(1500);
        for _ in 0..5 {
            bank.update([900, 1900]);
        }
        assert_eq!(bank.averages(), [900, 1900]);
    }

    #[test]
    fn saturated_inputs_do_not_overflow() {
        let mut bank = FilterBank::<1>::new(u32::MAX);
        assert_eq!(bank.update([u32::MAX]), [u32::MAX]);
    }
}
