use embassy_stm32::exti::ExtiInput;
use rover_core::capture::{ChannelId, EdgeLevel};
use rover_core::scheduler::Timebase;

use super::CAPTURE;
use crate::hw::EmbassyTimebase;

/// Timestamps every edge on one receiver input.
#[embassy_executor::task(pool_size = 3)]
pub async fn run(channel: ChannelId, mut pin: ExtiInput<'static>) -> ! {
    let timebase = EmbassyTimebase;
    defmt::debug!("capture: listening on {}", channel.label());

    loop {
        pin.wait_for_any_edge().await;
        let now_us = timebase.now_micros();
        let level = EdgeLevel::from_high(pin.is_high());
        if let Some(width) = CAPTURE.on_edge(channel, level, now_us) {
            defmt::trace!("capture: {} {}us", channel.label(), width);
        }
    }
}
